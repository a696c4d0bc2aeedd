// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, info, warn};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

use crate::exception::Exception;
use crate::path::normalize_prefix;

/// 单个文件的缓存头覆盖项，键为公开路径
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FileOverride {
    pub cache_control: Option<String>,
    pub max_age: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_root_directory")]
    root_directory: String,
    #[serde(default = "default_prefix")]
    prefix: String,
    #[serde(default)]
    gzip: bool,
    #[serde(default = "default_true")]
    preload: bool,
    #[serde(default)]
    buffer: bool,
    #[serde(default)]
    dynamic: bool,
    #[serde(default)]
    use_precompiled_gzip: bool,
    #[serde(default)]
    filter: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<String>,
    #[serde(default)]
    alias: BTreeMap<String, String>,
    #[serde(default)]
    cache_control: Option<String>,
    #[serde(default)]
    max_age: u64,
    #[serde(default)]
    files: HashMap<String, FileOverride>,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_true")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
}

fn default_root_directory() -> String {
    ".".to_string()
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    7878
}

fn default_chunk_size() -> usize {
    65536 // 64KB
}

impl Config {
    pub fn new() -> Self {
        Self {
            root_directory: default_root_directory(),
            prefix: default_prefix(),
            gzip: false,
            preload: true,
            buffer: false,
            dynamic: false,
            use_precompiled_gzip: false,
            filter: None,
            exclude: None,
            alias: BTreeMap::new(),
            cache_control: None,
            max_age: 0,
            files: HashMap::new(),
            port: default_port(),
            local: true,
            worker_threads: num_cpus::get(),
            chunk_size: default_chunk_size(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => {
                error!("无法打开配置文件{}：{}", filename, e);
                return Err(Exception::ConfigInvalid);
            }
        };
        let mut str_val = String::new();
        if let Err(e) = file.read_to_string(&mut str_val) {
            error!("读取配置文件{}失败：{}", filename, e);
            return Err(Exception::ConfigInvalid);
        }
        Ok(Self::from_str_or_default(&str_val))
    }

    /// 解析 TOML 文本，失败时记录错误并使用默认配置
    pub fn from_str_or_default(text: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(text) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.chunk_size == 0 {
            warn!("chunk_size被设置为0，该值将被改为{}。", default_chunk_size());
            raw_config.chunk_size = default_chunk_size();
        }
        raw_config
    }

    /// 由配置构建缓存引擎的选项
    pub fn options(&self) -> Options {
        let exclude = match &self.exclude {
            Some(pattern) => match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("exclude正则表达式{}无效，已忽略：{}", pattern, e);
                    None
                }
            },
            None => None,
        };
        let filter = match (&self.filter, exclude) {
            (Some(list), None) => FileFilter::allow_list(list.iter().cloned()),
            (None, Some(re)) => FileFilter::Exclude(re),
            (Some(list), Some(re)) => {
                let allowed: HashSet<String> = list.iter().cloned().collect();
                FileFilter::Predicate(Arc::new(move |name: &str| {
                    allowed.contains(name) && !re.is_match(name)
                }))
            }
            (None, None) => FileFilter::All,
        };
        info!(
            "缓存选项：root={}, prefix={}, gzip={}, buffer={}, dynamic={}",
            self.root_directory, self.prefix, self.gzip, self.buffer, self.dynamic
        );
        Options {
            root_directory: PathBuf::from(&self.root_directory),
            prefix: normalize_prefix(&self.prefix),
            gzip: self.gzip,
            preload: self.preload,
            buffer: self.buffer,
            dynamic: self.dynamic,
            use_precompiled_gzip: self.use_precompiled_gzip,
            filter,
            alias: self.alias.clone(),
            cache_control: self.cache_control.clone(),
            max_age: self.max_age,
            files: self.files.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn root_directory(&self) -> &str {
        &self.root_directory
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// 预加载时决定哪些相对路径需要登记
#[derive(Clone)]
pub enum FileFilter {
    /// 全部登记
    All,
    /// 只登记列表中的相对路径
    AllowList(HashSet<String>),
    /// 跳过匹配该正则的相对路径
    Exclude(Regex),
    /// 自定义判定函数
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl FileFilter {
    pub fn allow_list<I: IntoIterator<Item = String>>(names: I) -> Self {
        FileFilter::AllowList(names.into_iter().collect())
    }

    pub fn accepts(&self, name: &str) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::AllowList(names) => names.contains(name),
            FileFilter::Exclude(re) => !re.is_match(name),
            FileFilter::Predicate(f) => f(name),
        }
    }
}

impl fmt::Debug for FileFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFilter::All => write!(f, "All"),
            FileFilter::AllowList(names) => write!(f, "AllowList({:?})", names),
            FileFilter::Exclude(re) => write!(f, "Exclude({})", re.as_str()),
            FileFilter::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// 缓存引擎的运行选项。
///
/// `prefix` 必须以 `/` 开头并以 `/` 结尾，经 [`Config::options`] 构建时会自动处理；
/// 直接构造时 [`StaticCache::new`](crate::cache::StaticCache::new) 同样会规范化一次。
#[derive(Debug, Clone)]
pub struct Options {
    pub root_directory: PathBuf,
    pub prefix: String,
    pub gzip: bool,
    pub preload: bool,
    pub buffer: bool,
    pub dynamic: bool,
    pub use_precompiled_gzip: bool,
    pub filter: FileFilter,
    /// 别名公开路径 → 目标公开路径
    pub alias: BTreeMap<String, String>,
    pub cache_control: Option<String>,
    pub max_age: u64,
    pub files: HashMap<String, FileOverride>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            prefix: "/".to_string(),
            gzip: false,
            preload: true,
            buffer: false,
            dynamic: false,
            use_precompiled_gzip: false,
            filter: FileFilter::All,
            alias: BTreeMap::new(),
            cache_control: None,
            max_age: 0,
            files: HashMap::new(),
        }
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态缓存引擎
//!
//! [`StaticCache`] 在构建时预加载根目录下的文件并解析别名，之后对每个请求依次执行：
//!
//! 方法检查 → 前缀检查 → 路径解析 → 查表（未命中时动态加载 / 命中时检查是否过期）
//! → 条件请求判断 → 组装响应。
//!
//! 引擎本身不处理 HTTP 传输：它接收 [`Request`]，返回 [`Outcome`]。
//! `Outcome::NotHandled` 表示交给宿主的下一个处理器（通常是 404）。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, info, warn};

use crate::{
    compress::{is_eligible, Compressor, GzipCompressor},
    config::Options,
    exception::Exception,
    fresh::{format_http_date, is_fresh, quote_etag},
    loader::{load_file, walk},
    param::{HttpRequestMethod, GZIP_SUFFIX},
    path::{normalize, normalize_prefix, resolve_dynamic, resolve_request},
    record::FileRecord,
    request::Request,
    response::{Body, Response},
    store::FileStore,
    stream::FileStream,
    util::format_file_size,
};

/// 默认的流式读取块大小
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// 一次请求的处理结果
#[derive(Debug)]
pub enum Outcome {
    /// 由缓存生成的响应
    Handled(Response),
    /// 缓存不处理该请求，交给后续处理器
    NotHandled,
    /// 生成响应时出错
    Failed(Exception),
}

impl Outcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled(_))
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Outcome::Handled(response) => Some(response),
            _ => None,
        }
    }
}

pub struct StaticCache {
    options: Arc<Options>,
    store: Arc<FileStore>,
    compressor: Arc<dyn Compressor>,
    chunk_size: usize,
}

impl StaticCache {
    /// 使用 gzip 压缩器构建缓存。预加载中任何文件加载失败都会使构建失败。
    pub fn new(options: Options) -> Result<Self, Exception> {
        Self::with_compressor(options, Arc::new(GzipCompressor::default()))
    }

    pub fn with_compressor(
        mut options: Options,
        compressor: Arc<dyn Compressor>,
    ) -> Result<Self, Exception> {
        options.prefix = normalize_prefix(&options.prefix);
        options.root_directory = absolute_root(&options.root_directory);
        let store = FileStore::new();

        if options.preload {
            let mut count = 0usize;
            let mut total = 0u64;
            for name in walk(&options.root_directory)? {
                if !options.filter.accepts(&name) {
                    continue;
                }
                let record = match load_file(&name, &options, &store) {
                    Ok(record) => record,
                    Err(e) => {
                        error!("预加载文件{}失败: {}", name, e);
                        return Err(e);
                    }
                };
                count += 1;
                total += record.snapshot().size;
            }
            info!("预加载完成：{}个文件，共{}", count, format_file_size(total));
        }

        for (alias, target) in &options.alias {
            let alias = normalize(alias);
            if store.alias(&alias, &normalize(target)) {
                info!("alias from {} to {}", alias, target);
            } else {
                debug!("别名{}的目标{}未登记，跳过", alias, target);
            }
        }

        info!(
            "file list in dir: {}, prefix: {}",
            options.root_directory.display(),
            options.prefix
        );
        for key in store.keys() {
            debug!("{}", key);
        }

        Ok(Self {
            options: Arc::new(options),
            store: Arc::new(store),
            compressor,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// 处理一个请求。`id` 只用于日志追踪。
    pub async fn handle(&self, request: &Request, id: u128) -> Outcome {
        let method = request.method();
        if method != HttpRequestMethod::Get && method != HttpRequestMethod::Head {
            debug!("[ID{}]方法{}不由缓存处理", id, method);
            return Outcome::NotHandled;
        }
        // 先检查前缀，避免无谓的解码
        if !request.path().starts_with(&self.options.prefix) {
            return Outcome::NotHandled;
        }

        let public = resolve_request(request.path());
        debug!("[ID{}]请求路径{}解析为{}", id, request.path(), public);
        // `..` 可能让规范化后的路径离开前缀
        if !public.starts_with(&self.options.prefix) {
            debug!("[ID{}]{}规范化后不在前缀{}之下", id, public, self.options.prefix);
            return Outcome::NotHandled;
        }

        let record = match self.store.get(&public) {
            Some(record) => {
                if let Err(e) = self.refresh_if_stale(&record, id).await {
                    warn!("[ID{}]无法检查{}是否过期: {}", id, public, e);
                    return Outcome::NotHandled;
                }
                record
            }
            None => match self.load_dynamic(&public, id).await {
                Ok(Some(record)) => record,
                Ok(None) => return Outcome::NotHandled,
                Err(e) => return Outcome::Failed(e),
            },
        };

        self.respond(request, record, id).await
    }

    /// 未缓冲的记录每次命中都重新 stat，磁盘上更新过则标记为过期。
    /// 已缓冲的记录加载后不再自我刷新。
    async fn refresh_if_stale(&self, record: &FileRecord, id: u128) -> std::io::Result<()> {
        if record.snapshot().content.is_some() {
            return Ok(());
        }
        let metadata = tokio::fs::metadata(record.source_path()).await?;
        let modified = metadata.modified()?;
        if record.mark_stale_if_newer(metadata.len(), modified) {
            debug!("[ID{}]{}已过期，摘要将在下次完整读取时重新计算", id, record.public_path());
        }
        Ok(())
    }

    /// 动态加载未登记的文件。返回 `Ok(None)` 表示放行。
    async fn load_dynamic(
        &self,
        public: &str,
        id: u128,
    ) -> Result<Option<Arc<FileRecord>>, Exception> {
        if !self.options.dynamic {
            return Ok(None);
        }
        let (name, full_path) =
            match resolve_dynamic(public, &self.options.prefix, &self.options.root_directory) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!("[ID{}]拒绝动态加载{}: {}", id, public, e);
                    return Ok(None);
                }
            };

        match tokio::fs::metadata(&full_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                debug!("[ID{}]{}不是普通文件", id, full_path.display());
                return Ok(None);
            }
            Err(_) => {
                debug!("[ID{}]{}不存在", id, full_path.display());
                return Ok(None);
            }
        }

        let options = Arc::clone(&self.options);
        let store = Arc::clone(&self.store);
        let loaded = tokio::task::spawn_blocking(move || load_file(&name, &options, &store)).await;
        match loaded {
            Ok(Ok(record)) => {
                debug!("[ID{}]动态加载{}", id, record.public_path());
                Ok(Some(record))
            }
            Ok(Err(e)) => {
                warn!("[ID{}]动态加载{}失败: {}", id, public, e);
                Ok(None)
            }
            Err(e) => {
                error!("[ID{}]动态加载任务异常: {}", id, e);
                Err(Exception::BackgroundTaskFailed)
            }
        }
    }

    async fn respond(&self, request: &Request, record: Arc<FileRecord>, id: u128) -> Outcome {
        let state = record.snapshot();
        let mut response = Response::new();

        if self.options.gzip {
            response.vary = Some("Accept-Encoding");
        }
        response.last_modified = Some(format_http_date(state.modified));
        let etag = state.digest.as_deref().map(quote_etag);
        response.etag = etag.clone();

        if is_fresh(request, etag.as_deref(), state.modified) {
            debug!("[ID{}]客户端缓存仍然新鲜，返回304", id);
            response.set_code(304);
            return Outcome::Handled(response);
        }

        response.content_type = Some(record.mime_type().to_string());
        response.content_length = Some(state.size);
        response.cache_control = Some(record.cache_control());
        response.content_md5 = state.digest.clone();

        if request.method() == HttpRequestMethod::Head {
            return Outcome::Handled(response);
        }

        let should_gzip = is_eligible(self.options.gzip, state.size, record.mime_type())
            && request.accepts_gzip();
        debug!(
            "[ID{}]文件类型: {}, Accept-Encoding: {}, 使用gzip: {}",
            id,
            record.mime_type(),
            request.accept_encoding().unwrap_or("-"),
            should_gzip
        );

        if let Some(content) = state.content {
            if should_gzip {
                match self.compressed_body(&record, id).await {
                    Ok(compressed) => {
                        response.content_encoding = Some("gzip");
                        response.content_length = Some(compressed.len() as u64);
                        response.body = Body::Bytes(compressed);
                        return Outcome::Handled(response);
                    }
                    Err(Exception::CompressionFailure) => {
                        error!("[ID{}]压缩{}失败，返回未压缩内容", id, record.public_path());
                    }
                    Err(e) => return Outcome::Failed(e),
                }
            }
            response.content_length = Some(content.len() as u64);
            response.body = Body::Bytes(content);
            return Outcome::Handled(response);
        }

        let stream = FileStream::open(
            Arc::clone(&record),
            state.size,
            state.modified,
            state.digest.is_none(),
            should_gzip,
            self.chunk_size,
        )
        .await;
        match stream {
            Ok(stream) => {
                if should_gzip {
                    // 压缩后的长度事先未知
                    response.content_length = None;
                    response.content_encoding = Some("gzip");
                }
                debug!("[ID{}]使用流式传输{}", id, record.public_path());
                response.body = Body::Stream(stream);
                Outcome::Handled(response)
            }
            Err(e) => {
                warn!("[ID{}]无法打开{}: {}", id, record.source_path().display(), e);
                Outcome::NotHandled
            }
        }
    }

    /// 取得缓冲内容的压缩版本，必要时优先复用已缓冲的 `.gz` 兄弟文件。
    ///
    /// 压缩在阻塞线程池中进行，不占用异步工作线程。
    async fn compressed_body(&self, record: &Arc<FileRecord>, id: u128) -> Result<Bytes, Exception> {
        let sibling = if self.options.use_precompiled_gzip {
            self.store
                .get(&format!("{}{}", record.public_path(), GZIP_SUFFIX))
                .and_then(|gz| gz.snapshot().content)
        } else {
            None
        };
        if sibling.is_some() {
            debug!("[ID{}]复用预压缩文件{}{}", id, record.public_path(), GZIP_SUFFIX);
        }

        let record = Arc::clone(record);
        let compressor = Arc::clone(&self.compressor);
        let joined = tokio::task::spawn_blocking(move || {
            record.compressed_or_init(|content| match sibling {
                Some(gz) => Ok(gz),
                None => compressor.compress(content).map(Bytes::from).map_err(|e| {
                    error!("gzip压缩失败: {}", e);
                    Exception::CompressionFailure
                }),
            })
        })
        .await;
        match joined {
            Ok(result) => result,
            Err(e) => {
                error!("[ID{}]压缩任务异常: {}", id, e);
                Err(Exception::BackgroundTaskFailed)
            }
        }
    }
}

/// 根目录的绝对路径。目录存在时解析符号链接，否则相对当前工作目录拼接。
fn absolute_root(root: &Path) -> PathBuf {
    match std::fs::canonicalize(root) {
        Ok(path) => path,
        Err(_) if root.is_absolute() => root.to_path_buf(),
        Err(_) => match std::env::current_dir() {
            Ok(cwd) => cwd.join(root),
            Err(_) => root.to_path_buf(),
        },
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件记录
//!
//! 每个被服务的文件对应一个 [`FileRecord`]，通过 `Arc` 在缓存表中共享，
//! 别名与原路径指向同一个对象。
//!
//! 可变部分（大小、修改时间、摘要、缓冲内容、压缩内容）放在记录自己的读写锁里，
//! 不同文件之间的请求互不阻塞。摘要与压缩内容都是派生数据：
//! - `digest == None` 表示"未知，需要重新计算"，此时不能输出 ETag；
//! - `compressed` 只在 `content` 存在时出现，并且必须由当前的 `content` 计算得到，
//!   任何使 `content` 或 `digest` 失效的操作都会同时清空它。

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use bytes::Bytes;
use log::{debug, warn};

use crate::exception::Exception;

/// 某一时刻记录可变部分的一致快照
#[derive(Debug, Clone)]
pub struct RecordState {
    pub size: u64,
    pub modified: SystemTime,
    pub digest: Option<String>,
    pub content: Option<Bytes>,
    pub compressed: Option<Bytes>,
}

impl Default for RecordState {
    fn default() -> Self {
        Self {
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
            digest: None,
            content: None,
            compressed: None,
        }
    }
}

#[derive(Debug)]
pub struct FileRecord {
    source_path: PathBuf,
    public_path: String,
    mime_type: &'static str,
    cache_control: Option<String>,
    max_age: u64,
    state: RwLock<RecordState>,
    // 保证同一记录同一时间最多只有一个压缩任务
    compress_guard: Mutex<()>,
}

impl FileRecord {
    pub fn new(
        public_path: &str,
        source_path: &Path,
        mime_type: &'static str,
        cache_control: Option<String>,
        max_age: u64,
    ) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            public_path: public_path.to_string(),
            mime_type,
            cache_control,
            max_age,
            state: RwLock::new(RecordState::default()),
            compress_guard: Mutex::new(()),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// `Cache-Control` 响应头：优先使用显式覆盖值
    pub fn cache_control(&self) -> String {
        match &self.cache_control {
            Some(value) => value.clone(),
            None => format!("public, max-age={}", self.max_age),
        }
    }

    pub fn snapshot(&self) -> RecordState {
        self.read_state().clone()
    }

    /// 用一次完整加载的结果覆盖可变部分，压缩内容随之失效
    pub fn refresh(&self, size: u64, modified: SystemTime, content: Option<Bytes>, digest: Option<String>) {
        let mut state = self.write_state();
        state.size = size;
        state.modified = modified;
        state.content = content;
        state.digest = digest;
        state.compressed = None;
    }

    /// 磁盘上的修改时间比缓存的新时，更新元数据并清空摘要。
    ///
    /// 内容不在这里重新读取，而是在下一次流式响应时顺带计算摘要。
    pub fn mark_stale_if_newer(&self, size: u64, modified: SystemTime) -> bool {
        let mut state = self.write_state();
        if modified <= state.modified {
            return false;
        }
        debug!("文件{}已在磁盘上更新，标记为过期", self.public_path);
        state.size = size;
        state.modified = modified;
        state.digest = None;
        state.compressed = None;
        true
    }

    /// 流式读取完成后回填摘要。期间记录若已被刷新，则丢弃这次的结果。
    pub fn store_digest(&self, digest: String, read_against: SystemTime) -> bool {
        let mut state = self.write_state();
        if state.modified != read_against || state.digest.is_some() {
            return false;
        }
        state.digest = Some(digest);
        true
    }

    /// 取得压缩内容，不存在时用 `compute` 由当前缓冲内容计算并缓存。
    ///
    /// 同一记录上的并发调用会排队，后来者直接复用先行者的结果。
    pub fn compressed_or_init<F>(&self, compute: F) -> Result<Bytes, Exception>
    where
        F: FnOnce(&Bytes) -> Result<Bytes, Exception>,
    {
        let _guard = self.lock_compress();

        let content = {
            let state = self.read_state();
            if let Some(compressed) = &state.compressed {
                return Ok(compressed.clone());
            }
            match &state.content {
                Some(content) => content.clone(),
                None => return Err(Exception::CompressionFailure),
            }
        };

        let compressed = compute(&content)?;

        let mut state = self.write_state();
        let unchanged = state
            .content
            .as_ref()
            .map_or(false, |current| current.as_ptr() == content.as_ptr() && current.len() == content.len());
        if unchanged {
            state.compressed = Some(compressed.clone());
        } else {
            debug!("文件{}在压缩期间被刷新，不缓存本次压缩结果", self.public_path);
        }
        Ok(compressed)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RecordState> {
        match self.state.read() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("文件记录{}的锁被污染，恢复并继续", self.public_path);
                poisoned.into_inner()
            }
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RecordState> {
        match self.state.write() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("文件记录{}的锁被污染，恢复并继续", self.public_path);
                poisoned.into_inner()
            }
        }
    }

    fn lock_compress(&self) -> MutexGuard<'_, ()> {
        match self.compress_guard.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

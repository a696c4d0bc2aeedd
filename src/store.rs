// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件记录表
//!
//! 公开路径 → [`FileRecord`] 的并发映射。只增不删：构建时由预加载填充，
//! 运行期间动态加载可能追加新条目，进程生命周期内没有任何条目会被移除。
//! 底层使用分片的 `DashMap`，不相关路径上的读写不会互相阻塞。

use std::sync::Arc;

use dashmap::DashMap;

use crate::record::FileRecord;

#[derive(Debug, Default)]
pub struct FileStore {
    files: DashMap<String, Arc<FileRecord>>,
}

impl FileStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    pub fn get(&self, public_path: &str) -> Option<Arc<FileRecord>> {
        self.files.get(public_path).map(|entry| Arc::clone(entry.value()))
    }

    /// 取出已有记录，不存在时原子地插入 `init` 构造的新记录
    pub fn get_or_insert_with<F>(&self, public_path: &str, init: F) -> Arc<FileRecord>
    where
        F: FnOnce() -> FileRecord,
    {
        let entry = self
            .files
            .entry(public_path.to_string())
            .or_insert_with(|| Arc::new(init()));
        Arc::clone(entry.value())
    }

    /// 让 `alias` 指向与 `target` 相同的记录。`target` 未登记时返回 `false`。
    pub fn alias(&self, alias: &str, target: &str) -> bool {
        let record = match self.get(target) {
            Some(record) => record,
            None => return false,
        };
        self.files.insert(alias.to_string(), record);
        true
    }

    pub fn contains(&self, public_path: &str) -> bool {
        self.files.contains_key(public_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 所有键，按字典序排列
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.files.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 加载器
//!
//! 从磁盘读取文件的元数据（以及在启用缓冲时的完整内容），填充或刷新对应的
//! [`FileRecord`]。预加载与请求期的动态加载共用同一套逻辑。

use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use log::{debug, error, warn};
use md5::{Digest, Md5};
use walkdir::{DirEntry, WalkDir};

use crate::{
    config::Options,
    exception::Exception,
    param::mime_for,
    path::public_key,
    record::FileRecord,
    store::FileStore,
};

/// 内容的 MD5 摘要，base64 编码
pub fn digest_of(content: &[u8]) -> String {
    STANDARD.encode(Md5::digest(content))
}

/// 加载根目录下的 `name`（以 `/` 分隔的相对路径）并登记到 `store`。
///
/// 同一个 `name` 重复加载时复用已有记录，只覆盖其可变字段，
/// 因此指向它的别名也能看到最新的数据。
pub fn load_file(
    name: &str,
    options: &Options,
    store: &FileStore,
) -> Result<Arc<FileRecord>, Exception> {
    let public = public_key(&options.prefix, name);
    let source = options.root_directory.join(name);

    let metadata = match fs::metadata(&source) {
        Ok(meta) => meta,
        Err(e) => {
            warn!("无法获取文件{}的元数据: {}", source.display(), e);
            return Err(Exception::FileNotFound);
        }
    };
    if !metadata.is_file() {
        return Err(Exception::NotARegularFile);
    }
    let modified = match metadata.modified() {
        Ok(time) => time,
        Err(e) => {
            error!("无法获取文件{}的修改时间: {}", source.display(), e);
            return Err(Exception::FileNotFound);
        }
    };

    let (size, content, digest) = if options.buffer {
        match fs::read(&source) {
            Ok(buffer) => {
                let digest = digest_of(&buffer);
                (buffer.len() as u64, Some(Bytes::from(buffer)), Some(digest))
            }
            Err(e) => {
                error!("无法读取文件{}: {}", source.display(), e);
                return Err(Exception::FileNotFound);
            }
        }
    } else {
        (metadata.len(), None, None)
    };

    let record = store.get_or_insert_with(&public, || {
        let entry = options.files.get(&public);
        let cache_control = entry
            .and_then(|o| o.cache_control.clone())
            .or_else(|| options.cache_control.clone());
        let max_age = entry.and_then(|o| o.max_age).unwrap_or(options.max_age);
        FileRecord::new(&public, &source, mime_for(&public), cache_control, max_age)
    });
    record.refresh(size, modified, content, digest);
    debug!("已加载{} -> {} ({} bytes)", public, source.display(), size);
    Ok(record)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.'))
}

/// 递归列出根目录下的所有普通文件，返回以 `/` 分隔的相对路径。
///
/// 以 `.` 开头的文件和目录会被跳过。
pub fn walk(root: &Path) -> Result<Vec<String>, Exception> {
    let mut names = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("遍历目录{}失败: {}", root.display(), e);
                return Err(Exception::PreloadFailed);
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let name: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        names.push(name.join("/"));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileOverride;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn options(root: &Path, buffer: bool) -> Options {
        Options {
            root_directory: root.to_path_buf(),
            buffer,
            ..Options::default()
        }
    }

    #[test]
    fn test_digest_of() {
        // echo -n "hello" | openssl md5 -binary | base64
        assert_eq!(digest_of(b"hello"), "XUFAKrxLKna5cZ2REBfFkg==");
    }

    #[test]
    fn test_load_buffered_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("app.css"), "body { color: red; }").unwrap();

        let store = FileStore::new();
        let record = load_file("app.css", &options(temp_dir.path(), true), &store).unwrap();
        let state = record.snapshot();

        assert_eq!(record.public_path(), "/app.css");
        assert_eq!(record.source_path(), temp_dir.path().join("app.css"));
        assert_eq!(record.mime_type(), "text/css; charset=utf-8");
        assert_eq!(state.size, 20);
        assert_eq!(state.content.as_deref(), Some(&b"body { color: red; }"[..]));
        assert_eq!(state.digest, Some(digest_of(b"body { color: red; }")));
    }

    #[test]
    fn test_load_unbuffered_leaves_digest_unknown() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("logo.png"), vec![0u8; 300]).unwrap();

        let store = FileStore::new();
        let record = load_file("logo.png", &options(temp_dir.path(), false), &store).unwrap();
        let state = record.snapshot();
        assert_eq!(state.size, 300);
        assert!(state.content.is_none());
        assert!(state.digest.is_none());
        assert_eq!(record.mime_type(), "image/png");
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new();
        let result = load_file("nope.js", &options(temp_dir.path(), true), &store);
        assert_eq!(result.unwrap_err(), Exception::FileNotFound);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reload_preserves_identity() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "one").unwrap();

        let store = FileStore::new();
        let opts = options(temp_dir.path(), true);
        let first = load_file("a.txt", &opts, &store).unwrap();
        store.alias("/alias.txt", "/a.txt");

        fs::write(&path, "three").unwrap();
        let second = load_file("a.txt", &opts, &store).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let via_alias = store.get("/alias.txt").unwrap().snapshot();
        assert_eq!(via_alias.size, 5);
        assert_eq!(via_alias.digest, Some(digest_of(b"three")));
    }

    #[test]
    fn test_overrides_and_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.js"), "1").unwrap();
        fs::write(temp_dir.path().join("b.js"), "2").unwrap();

        let mut opts = options(temp_dir.path(), false);
        opts.max_age = 300;
        opts.files.insert(
            "/a.js".to_string(),
            FileOverride {
                cache_control: Some("no-cache".to_string()),
                max_age: Some(5),
            },
        );
        let store = FileStore::new();
        let a = load_file("a.js", &opts, &store).unwrap();
        let b = load_file("b.js", &opts, &store).unwrap();
        assert_eq!(a.cache_control(), "no-cache");
        assert_eq!(b.cache_control(), "public, max-age=300");

        // 只覆盖 max_age 时仍生成 public 头
        opts.files.insert(
            "/b.js".to_string(),
            FileOverride {
                cache_control: None,
                max_age: Some(5),
            },
        );
        let store = FileStore::new();
        let b = load_file("b.js", &opts, &store).unwrap();
        assert_eq!(b.cache_control(), "public, max-age=5");
    }

    #[test]
    fn test_walk_is_recursive_and_skips_hidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("css")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        File::create(root.join("index.js")).unwrap().write_all(b"x").unwrap();
        File::create(root.join("css/app.css")).unwrap().write_all(b"x").unwrap();
        File::create(root.join(".env")).unwrap().write_all(b"x").unwrap();
        File::create(root.join(".git/HEAD")).unwrap().write_all(b"x").unwrap();

        let names = walk(root).unwrap();
        assert_eq!(names, vec!["css/app.css".to_string(), "index.js".to_string()]);
    }

    #[test]
    fn test_walk_missing_root() {
        assert_eq!(
            walk(Path::new("/definitely/not/a/dir")).unwrap_err(),
            Exception::PreloadFailed
        );
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析模块
//!
//! 把原始请求路径转换为缓存表中的公开路径（public path），并在动态加载前
//! 把公开路径映射回根目录下的物理路径。这里的函数都是纯函数，不访问文件系统。
//!
//! 所有路径都按 `/` 分隔处理，与请求 URI 的语义保持一致。

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use log::debug;
use percent_encoding::percent_decode_str;

use crate::exception::Exception;

/// 百分号解码。解码结果不是合法 UTF-8 时返回 [`Exception::InvalidPath`]。
pub fn decode_path(text: &str) -> Result<Cow<'_, str>, Exception> {
    percent_decode_str(text)
        .decode_utf8()
        .map_err(|_| Exception::InvalidPath)
}

/// 百分号解码，失败时退回原始文本，而不是让请求失败。
pub fn safe_decode(text: &str) -> Cow<'_, str> {
    match decode_path(text) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("路径{}: {}，使用原始文本", text, e);
            Cow::Borrowed(text)
        }
    }
}

/// 规范化路径：折叠重复的分隔符，消解 `.` 与 `..`。
///
/// 绝对路径中越过根的 `..` 会被丢弃；相对路径中无法消解的 `..` 会被保留。
/// 原路径以 `/` 结尾时结果也保留结尾的 `/`。
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => {
                    if !absolute {
                        segments.push("..");
                    }
                }
            },
            s => segments.push(s),
        }
    }

    let mut normalized = segments.join("/");
    if absolute {
        normalized.insert(0, '/');
    }
    if normalized.is_empty() {
        return ".".to_string();
    }
    if trailing && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// 保证前缀以 `/` 开头并以 `/` 结尾：`""` → `"/"`，`"/static"` → `"/static/"`
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    let mut result = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('/') {
        result.push('/');
    }
    result.push_str(trimmed);
    result.push('/');
    result
}

/// 相对于根目录的文件名在缓存表中对应的键
pub fn public_key(prefix: &str, name: &str) -> String {
    normalize(&format!("{}/{}", prefix, name))
}

/// 解码并规范化请求路径，得到用于查表的公开路径
pub fn resolve_request(raw: &str) -> String {
    normalize(&safe_decode(raw))
}

/// 最后一段以 `.` 开头的路径视为隐藏文件
pub fn is_hidden(public: &str) -> bool {
    public
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map_or(false, |name| name.starts_with('.'))
}

/// 把公开路径映射回根目录下的物理路径，用于动态加载。
///
/// 返回 `(相对文件名, 物理路径)`。在任何文件系统访问之前完成以下检查：
/// 1. 隐藏文件直接拒绝；
/// 2. 去掉前缀，不以前缀开头时拒绝；
/// 3. 拼接后的路径必须仍位于根目录之内。
pub fn resolve_dynamic(
    public: &str,
    prefix: &str,
    root: &Path,
) -> Result<(String, PathBuf), Exception> {
    if is_hidden(public) || public.contains('\0') {
        return Err(Exception::PathTraversal);
    }

    let public = public.trim_start_matches('/');
    let file_prefix = prefix.trim_start_matches('/');
    let name = match public.strip_prefix(file_prefix) {
        Some(rest) => rest,
        None => return Err(Exception::PathTraversal),
    };

    let mut full_path = root.to_path_buf();
    for segment in name.split('/') {
        match segment {
            "" => {}
            "." | ".." => return Err(Exception::PathTraversal),
            s => full_path.push(s),
        }
    }
    if !full_path.starts_with(root) {
        return Err(Exception::PathTraversal);
    }

    Ok((name.to_string(), full_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_collapses_segments() {
        assert_eq!(normalize("//index.js"), "/index.js");
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("/a//b/"), "/a/b/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), ".");
    }

    #[test]
    fn test_normalize_never_climbs_above_root() {
        assert_eq!(normalize("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize("../a"), "../a");
    }

    #[test]
    fn test_safe_decode() {
        assert_eq!(safe_decode("/%E4%B8%AD%E6%96%87"), "/中文");
        assert_eq!(safe_decode("/a%20b.txt"), "/a b.txt");
        // 截断的 UTF-8 序列无法解码，退回原文
        assert_eq!(safe_decode("/%E4%B8"), "/%E4%B8");
    }

    #[test]
    fn test_decode_path_reports_invalid_utf8() {
        assert_eq!(decode_path("/a%20b.txt").unwrap(), "/a b.txt");
        assert_eq!(decode_path("/%E4%B8").unwrap_err(), Exception::InvalidPath);
        assert_eq!(decode_path("/%FF.js").unwrap_err(), Exception::InvalidPath);
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "/");
        assert_eq!(normalize_prefix("/"), "/");
        assert_eq!(normalize_prefix("/static"), "/static/");
        assert_eq!(normalize_prefix("static//"), "/static/");
    }

    #[test]
    fn test_public_key() {
        assert_eq!(public_key("/", "index.js"), "/index.js");
        assert_eq!(public_key("/static/", "css/app.css"), "/static/css/app.css");
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden("/.env"));
        assert!(is_hidden("/static/.git/"));
        assert!(!is_hidden("/static/app.js"));
        assert!(!is_hidden("/"));
    }

    #[test]
    fn test_resolve_dynamic_strips_prefix() {
        let root = Path::new("/srv/www");
        let (name, full) = resolve_dynamic("/static/js/app.js", "/static/", root).unwrap();
        assert_eq!(name, "js/app.js");
        assert_eq!(full, PathBuf::from("/srv/www/js/app.js"));
    }

    #[test]
    fn test_resolve_dynamic_rejects_traversal_and_hidden() {
        let root = Path::new("/srv/www");
        assert_eq!(
            resolve_dynamic("/../../etc/passwd", "/", root),
            Err(Exception::PathTraversal)
        );
        assert_eq!(
            resolve_dynamic("/.htpasswd", "/", root),
            Err(Exception::PathTraversal)
        );
        assert_eq!(
            resolve_dynamic("/other/app.js", "/static/", root),
            Err(Exception::PathTraversal)
        );
        assert_eq!(
            resolve_dynamic("/index.html\0.jpg", "/", root),
            Err(Exception::PathTraversal)
        );
    }

    #[test]
    fn test_encoded_traversal_is_neutralised() {
        let public = resolve_request("/%2e%2e/%2e%2e/etc/passwd");
        assert_eq!(public, "/etc/passwd");
        let (_, full) = resolve_dynamic(&public, "/", Path::new("/srv/www")).unwrap();
        assert!(full.starts_with("/srv/www"));
    }

    proptest! {
        #[test]
        fn prop_normalized_absolute_paths_have_no_dot_segments(raw in "(/|\\.|\\.\\.|[a-z]{1,3}){0,12}") {
            let normalized = normalize(&format!("/{}", raw));
            prop_assert!(normalized.starts_with('/'));
            for segment in normalized.trim_end_matches('/').split('/').skip(1) {
                prop_assert!(segment != "." && segment != ".." && !segment.is_empty());
            }
        }

        #[test]
        fn prop_normalize_is_idempotent(raw in "[a-z./]{0,24}") {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}

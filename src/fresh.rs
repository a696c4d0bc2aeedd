// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 条件请求
//!
//! 比较客户端携带的验证器（`If-None-Match` / `If-Modified-Since`）与当前的
//! `ETag` / `Last-Modified`，判断客户端缓存的副本是否仍然新鲜。

use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::request::Request;

/// IMF-fixdate 格式，例如 `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn format_http_date(time: SystemTime) -> String {
    let date: DateTime<Utc> = time.into();
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// RFC 850 与 asctime 两种过时格式，HTTP/1.1 的接收方仍需接受
const OBSOLETE_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// 解析 HTTP 日期，返回秒级时间戳
pub fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.timestamp());
    }
    OBSOLETE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|date| date.and_utc().timestamp())
}

/// 实体标签的响应头形式（带引号）
pub fn quote_etag(digest: &str) -> String {
    format!("\"{}\"", digest)
}

fn strip_weak(tag: &str) -> &str {
    tag.trim().strip_prefix("W/").unwrap_or(tag.trim())
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let etag = strip_weak(etag);
    if_none_match
        .split(',')
        .map(strip_weak)
        .any(|candidate| candidate == etag)
}

fn has_no_cache(cache_control: &str) -> bool {
    cache_control
        .split(',')
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
}

/// 客户端缓存是否新鲜。`etag` 为带引号的响应头值，摘要未知时为 `None`。
///
/// 两个验证器同时存在时必须都通过；请求带 `Cache-Control: no-cache` 时总是不新鲜。
pub fn is_fresh(request: &Request, etag: Option<&str>, last_modified: SystemTime) -> bool {
    let if_none_match = request.if_none_match();
    let if_modified_since = request.if_modified_since();
    if if_none_match.is_none() && if_modified_since.is_none() {
        return false;
    }

    if request.cache_control().map_or(false, has_no_cache) {
        return false;
    }

    if let Some(if_none_match) = if_none_match {
        if if_none_match.trim() != "*" {
            match etag {
                Some(etag) if etag_matches(if_none_match, etag) => {}
                _ => return false,
            }
        }
    }

    if let Some(if_modified_since) = if_modified_since {
        let since = match parse_http_date(if_modified_since) {
            Some(t) => t,
            None => return false,
        };
        let modified: DateTime<Utc> = last_modified.into();
        if modified.timestamp() > since {
            return false;
        }
    }

    true
}

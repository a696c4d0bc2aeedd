// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 静态缓存用到的 HTTP 常量和数据结构：
//! - 状态码及其原因短语（Reason Phrase）。
//! - 面向前端静态资源（脚本、样式、图片、字体）的 MIME 类型映射表。
//! - HTTP 方法的强类型枚举。

use lazy_static::lazy_static;
use std::collections::HashMap;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "static-cache";

/// HTTP 协议规定的换行符
pub const CRLF: &str = "\r\n";

/// 无法识别后缀时使用的兜底类型
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// 只有大于该字节数的文件才会被 gzip 压缩
pub const GZIP_MIN_LENGTH: u64 = 1024;

/// 预压缩兄弟文件的后缀
pub const GZIP_SUFFIX: &str = ".gz";

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");
        map.insert(304, "Not Modified");
        map.insert(400, "Bad Request");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(500, "Internal Server Error");
        map.insert(503, "Service Unavailable");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表，用于设置 `Content-Type`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        // 文本与脚本
        map.insert("css", "text/css; charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("htm", "text/html; charset=utf-8");
        map.insert("html", "text/html; charset=utf-8");
        map.insert("js", "application/javascript; charset=utf-8");
        map.insert("mjs", "application/javascript; charset=utf-8");
        map.insert("json", "application/json; charset=utf-8");
        map.insert("map", "application/json; charset=utf-8");
        map.insert("jsonld", "application/ld+json");
        map.insert("md", "text/markdown");
        map.insert("txt", "text/plain; charset=utf-8");
        map.insert("xml", "application/xml");
        map.insert("xhtml", "application/xhtml+xml");
        map.insert("webmanifest", "application/manifest+json");
        map.insert("wasm", "application/wasm");
        // 图片
        map.insert("avif", "image/avif");
        map.insert("bmp", "image/bmp");
        map.insert("gif", "image/gif");
        map.insert("ico", "image/x-icon");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("svg", "image/svg+xml");
        map.insert("webp", "image/webp");
        // 字体
        map.insert("eot", "application/vnd.ms-fontobject");
        map.insert("otf", "font/otf");
        map.insert("ttf", "font/ttf");
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        // 音视频
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("ogg", "audio/ogg");
        map.insert("wav", "audio/wav");
        map.insert("webm", "video/webm");
        // 归档
        map.insert("gz", "application/gzip");
        map.insert("pdf", "application/pdf");
        map.insert("tar", "application/x-tar");
        map.insert("zip", "application/zip");
        map
    };
}

/// 标准 HTTP 请求方法
///
/// 静态缓存只处理 `Get` 与 `Head`，其余方法一律交给后续处理器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpRequestMethod {
    /// 解析方法名（大小写不敏感），无法识别时返回 `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            _ => None,
        }
    }
}

use std::fmt;

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Put => write!(f, "PUT"),
            HttpRequestMethod::Delete => write!(f, "DELETE"),
            HttpRequestMethod::Patch => write!(f, "PATCH"),
        }
    }
}

/// 根据路径后缀查询 MIME 类型，未知后缀返回 `application/octet-stream`
pub fn mime_for(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    let extension = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return DEFAULT_MIME,
    };
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v,
        None => DEFAULT_MIME,
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 压缩模块
//!
//! 决定一个文件是否值得 gzip，并提供缓冲内容的压缩实现。
//! 流式内容的压缩在 [`crate::stream`] 中逐块完成。

use std::io::{self, Write};

use flate2::{write::GzEncoder, Compression};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::param::GZIP_MIN_LENGTH;

lazy_static! {
    static ref COMPRESSIBLE_PATTERN: Regex = Regex::new(r"^text/|\+(?:json|text|xml)$").unwrap();
}

/// 除 `text/*` 与 `+json`/`+xml` 结构化后缀外，其余可压缩的类型
const COMPRESSIBLE_TYPES: [&str; 10] = [
    "application/javascript",
    "application/json",
    "application/xml",
    "application/wasm",
    "application/x-javascript",
    "application/vnd.ms-fontobject",
    "font/otf",
    "font/ttf",
    "image/bmp",
    "image/x-icon",
];

/// 缓冲内容的压缩器。引擎通过该抽象调用压缩，便于替换实现。
#[cfg_attr(test, mockall::automock)]
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    pub fn new(level: Compression) -> Self {
        Self { level }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        let original_size = data.len();
        let ratio = if original_size > 0 {
            ((original_size as i64 - compressed.len() as i64) as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };
        debug!(
            "压缩完成, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
            original_size,
            compressed.len(),
            ratio
        );
        Ok(compressed)
    }
}

/// MIME 类型是否属于文本类、值得压缩的内容。忽略 `; charset=...` 等参数。
pub fn is_compressible(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    if essence.is_empty() {
        return false;
    }
    COMPRESSIBLE_TYPES.contains(&essence.as_str()) || COMPRESSIBLE_PATTERN.is_match(&essence)
}

/// 启用了 gzip、文件大于 1KB 且类型可压缩时才进行压缩
pub fn is_eligible(gzip_enabled: bool, size: u64, mime_type: &str) -> bool {
    gzip_enabled && size > GZIP_MIN_LENGTH && is_compressible(mime_type)
}

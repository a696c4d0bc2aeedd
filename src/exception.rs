// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了静态缓存在构建与请求处理过程中可能出现的各类异常情况。
//!
//! ## 传播策略
//! - **请求期**：文件系统与解码层面的错误全部被吸收为"不处理"（交给后续处理器），
//!   只有后台任务异常这类响应生成错误才会以 `Outcome::Failed` 的形式交给宿主；
//!   压缩失败时退回未压缩内容。
//! - **构建期**：预加载阶段的任何失败都会中止构建，保证对外提供服务前缓存集合是完整有效的。

use std::fmt;

/// 静态缓存处理过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行格式不正确，或使用了不支持的 HTTP 协议版本。
    MalformedRequest,
    /// 请求路径无法进行百分号解码。该错误会被降级处理：直接使用原始文本继续。
    InvalidPath,
    /// 路径经过规范化后落在根目录之外，或指向隐藏文件。
    PathTraversal,
    /// 文件不存在或无权访问。预加载时为致命错误，动态加载时转为放行。
    FileNotFound,
    /// 路径存在但不是普通文件（例如目录）。
    NotARegularFile,
    /// gzip 压缩失败。
    CompressionFailure,
    /// 阻塞线程池中的加载或压缩任务异常退出。
    BackgroundTaskFailed,
    /// 预加载时遍历根目录失败。
    PreloadFailed,
    /// 配置文件无法读取。
    ConfigInvalid,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed request line"),
            InvalidPath => write!(f, "Request path can't be percent-decoded"),
            PathTraversal => write!(f, "Path escapes the served root (400)"),
            FileNotFound => write!(f, "File not found (400)"),
            NotARegularFile => write!(f, "Path is not a regular file"),
            CompressionFailure => write!(f, "Failed to gzip the response body"),
            BackgroundTaskFailed => write!(f, "Background task panicked or was cancelled (500)"),
            PreloadFailed => write!(f, "Couldn't walk the root directory"),
            ConfigInvalid => write!(f, "Couldn't read the config file"),
        }
    }
}

impl std::error::Error for Exception {}

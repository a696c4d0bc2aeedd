// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求描述
//!
//! 缓存引擎消费的请求描述：方法、路径以及与协商相关的几个标头。
//! 既可以由宿主直接构造，也可以从 TCP 流读到的原始 HTTP/1.1 报文解析得到。

use crate::{exception::Exception, param::*};
use log::error;

#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 不含查询字符串的请求路径
    path: String,
    query: Option<String>,
    user_agent: String,
    accept_encoding: Option<String>,
    if_none_match: Option<String>,
    if_modified_since: Option<String>,
    cache_control: Option<String>,
}

impl Request {
    pub fn new(method: HttpRequestMethod, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            user_agent: String::new(),
            accept_encoding: None,
            if_none_match: None,
            if_modified_since: None,
            cache_control: None,
        }
    }

    /// 设置一个标头，名称大小写不敏感；与缓存无关的标头会被忽略
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    fn set_header(&mut self, name: &str, value: &str) {
        let value = value.trim().to_string();
        match name.trim().to_lowercase().as_str() {
            "user-agent" => self.user_agent = value,
            "accept-encoding" => self.accept_encoding = Some(value),
            "if-none-match" => self.if_none_match = Some(value),
            "if-modified-since" => self.if_modified_since = Some(value),
            "cache-control" => self.cache_control = Some(value),
            _ => {}
        }
    }

    /// 从原始字节缓冲区构建请求。
    ///
    /// 只接受 HTTP/1.0 与 HTTP/1.1；无法识别的方法名视为格式错误。
    /// `id` 只用于日志追踪。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string.trim_end_matches('\0'),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let head = request_string
            .split("\r\n\r\n")
            .next()
            .unwrap_or("");
        let mut lines = head.split(CRLF);

        // 请求行，例如 "GET /index.html HTTP/1.1"
        let request_line = lines.next().unwrap_or("");
        let parts: Vec<&str> = request_line.split(' ').filter(|s| !s.is_empty()).collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method = match HttpRequestMethod::parse(parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, parts[0]);
                return Err(Exception::MalformedRequest);
            }
        };

        let version = parts[2].to_uppercase();
        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            error!("[ID{}]不支持的HTTP协议版本：{}", id, &version);
            return Err(Exception::MalformedRequest);
        }

        let mut request = Self::new(method, parts[1]);
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                request.set_header(name, value);
            }
        }
        Ok(request)
    }

    /// 客户端是否接受 gzip。
    ///
    /// `gzip;q=0` 视为明确拒绝；没有列出 gzip 时，`*`（q>0）同样表示接受。
    pub fn accepts_gzip(&self) -> bool {
        let header = match &self.accept_encoding {
            Some(h) => h,
            None => return false,
        };
        let mut wildcard = false;
        for item in header.split(',') {
            let mut params = item.split(';');
            let coding = params.next().unwrap_or("").trim().to_lowercase();
            let q = params
                .filter_map(|p| p.trim().strip_prefix("q="))
                .filter_map(|v| v.trim().parse::<f32>().ok())
                .next()
                .unwrap_or(1.0);
            match coding.as_str() {
                "gzip" | "x-gzip" => return q > 0.0,
                "*" => wildcard = q > 0.0,
                _ => {}
            }
        }
        wildcard
    }
}

impl Request {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> Option<&str> {
        self.accept_encoding.as_deref()
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }

    pub fn if_modified_since(&self) -> Option<&str> {
        self.if_modified_since.as_deref()
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }
}

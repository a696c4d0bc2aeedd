// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{fresh::format_http_date, param::*, stream::FileStream, util::HtmlBuilder};

use bytes::Bytes;
use chrono::prelude::*;
use log::error;

/// 响应体：内存中的字节，或是从磁盘按块读取的流
#[derive(Debug)]
pub enum Body {
    Empty,
    Bytes(Bytes),
    Stream(FileStream),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// 内存中的字节；流与空响应体返回 `None`
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub(crate) status_code: u16,
    pub(crate) information: String,
    pub(crate) content_type: Option<String>,
    /// 流式压缩时长度未知，为 `None`
    pub(crate) content_length: Option<u64>,
    pub(crate) content_encoding: Option<&'static str>,
    pub(crate) last_modified: Option<String>,
    pub(crate) etag: Option<String>,
    pub(crate) content_md5: Option<String>,
    pub(crate) cache_control: Option<String>,
    pub(crate) vary: Option<&'static str>,
    pub(crate) date: DateTime<Utc>,
    pub(crate) server_name: String,
    pub(crate) body: Body,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: None,
            content_encoding: None,
            last_modified: None,
            etag: None,
            content_md5: None,
            cache_control: None,
            vary: None,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            body: Body::Empty,
        }
    }

    /// 生成一个带 HTML 说明页的状态码响应，供宿主在缓存不处理请求时使用
    pub fn from_status_code(code: u16, headonly: bool) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        let content = match code {
            404 => HtmlBuilder::from_status_code(404, Some(r"<h2>噢！</h2><p>你指定的文件无法找到。</p>")),
            500 => HtmlBuilder::from_status_code(500, Some(r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>")),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        response.content_type = Some("text/html; charset=utf-8".to_string());
        response.content_length = Some(content.len() as u64);
        if !headonly {
            response.body = Body::Bytes(Bytes::from(content));
        }
        response
    }

    pub(crate) fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    /// 按输出顺序排列的响应头
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(t) = &self.content_type {
            headers.push(("Content-Type", t.clone()));
        }
        if let Some(e) = self.content_encoding {
            headers.push(("Content-Encoding", e.to_string()));
        }
        if let Some(len) = self.content_length {
            headers.push(("Content-Length", len.to_string()));
        }
        if let Some(v) = &self.last_modified {
            headers.push(("Last-Modified", v.clone()));
        }
        if let Some(v) = &self.etag {
            headers.push(("ETag", v.clone()));
        }
        if let Some(v) = &self.content_md5 {
            headers.push(("Content-MD5", v.clone()));
        }
        if let Some(v) = &self.cache_control {
            headers.push(("Cache-Control", v.clone()));
        }
        if let Some(v) = self.vary {
            headers.push(("Vary", v.to_string()));
        }
        headers.push(("Date", format_http_date(self.date.into())));
        headers.push(("Server", self.server_name.clone()));
        headers
    }

    /// 按名称（大小写不敏感）查询响应头
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers()
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// 状态行与全部响应头，以空行结尾
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}{}", self.status_code, self.information, CRLF);
        for (name, value) in self.headers() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(&value);
            head.push_str(CRLF);
        }
        head.push_str("Connection: close");
        head.push_str(CRLF);
        head.push_str(CRLF);
        head.into_bytes()
    }

    pub fn into_body(self) -> Body {
        self.body
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_streaming(&self) -> bool {
        self.body.is_stream()
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 宿主服务器
//!
//! 一个最小的 HTTP/1.1 宿主：每个连接只处理一个请求，交给 [`StaticCache`] 处理后关闭。
//! 缓存放行的请求返回 404 页面，响应生成失败返回 500，无法解析的请求返回 400。

use std::io;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};

use crate::{
    cache::{Outcome, StaticCache},
    param::HttpRequestMethod,
    request::Request,
    response::{Body, Response},
};

/// 请求头部的最大长度，超出部分不再读取
pub const MAX_REQUEST_HEAD: usize = 8192;

/// 持续接收连接，每个连接交给一个独立的任务处理。只有 `accept` 失败时才返回。
pub async fn serve(listener: TcpListener, cache: Arc<StaticCache>) -> io::Result<()> {
    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = listener.accept().await?;
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(&mut stream, id, &cache).await {
                warn!("[ID{}]连接处理中断: {}", id, e);
            }
        });
        id += 1;
    }
}

/// 读取一个请求，生成并写回响应
pub async fn handle_connection<S>(stream: &mut S, id: u128, cache: &StaticCache) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let buffer = read_head(stream).await?;
    if buffer.is_empty() {
        // 客户端未发送任何内容就关闭了连接
        return Ok(());
    }
    let start_time = Instant::now();

    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}，返回400", id, e);
            return write_response(stream, Response::from_status_code(400, false), id).await;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let headonly = request.method() == HttpRequestMethod::Head;
    let response = match cache.handle(&request, id).await {
        Outcome::Handled(response) => response,
        Outcome::NotHandled => {
            debug!("[ID{}]缓存未处理{}，返回404", id, request.path());
            Response::from_status_code(404, headonly)
        }
        Outcome::Failed(e) => {
            error!("[ID{}]生成响应失败: {}", id, e);
            Response::from_status_code(500, headonly)
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    let target = match request.query() {
        Some(query) => format!("{}?{}", request.path(), query),
        None => request.path().to_string(),
    };
    info!(
        "[ID{}] {}, {}, {}, {}, {}",
        id,
        request.method(),
        target,
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    write_response(stream, response, id).await
}

/// 读到空行为止，或达到 [`MAX_REQUEST_HEAD`]
async fn read_head<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }
    Ok(buffer)
}

async fn write_response<S>(stream: &mut S, response: Response, id: u128) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&response.head_bytes()).await?;
    match response.into_body() {
        Body::Empty => {}
        Body::Bytes(bytes) => {
            debug!("[ID{}]发送全量响应，长度: {}", id, bytes.len());
            stream.write_all(&bytes).await?;
        }
        Body::Stream(file_stream) => {
            let total_sent = file_stream.write_to(stream).await?;
            debug!("[ID{}]流式传输完成，共发送 {} 字节", id, total_sent);
        }
    }
    stream.flush().await?;
    stream.shutdown().await
}

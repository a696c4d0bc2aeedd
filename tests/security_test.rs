// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod security_tests {
    //! # 安全回归测试
    //!
    //! 在临时目录上启动真实的服务器，模拟常见的攻击向量：
    //! - 路径遍历（明文与百分号编码）
    //! - 隐藏文件探测
    //! - 空字节注入
    //! - 畸形与超长请求

    use std::fs;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use static_cache::{server, HttpRequestMethod, Options, Outcome, Request, StaticCache};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const SECRET: &str = "TOP-SECRET-CONTENT";

    /// 目录结构：`<tmp>/secret.txt` 与 `<tmp>/public/{index.html,.env}`，只对外提供 `public`
    fn layout() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("secret.txt"), SECRET).unwrap();
        let public = temp_dir.path().join("public");
        fs::create_dir(&public).unwrap();
        fs::write(public.join("index.html"), "<h1>hello</h1>").unwrap();
        fs::write(public.join(".env"), SECRET).unwrap();
        temp_dir
    }

    fn cache_for(dir: &TempDir) -> StaticCache {
        StaticCache::new(Options {
            root_directory: dir.path().join("public"),
            dynamic: true,
            ..Options::default()
        })
        .unwrap()
    }

    async fn start_server(cache: StaticCache) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server::serve(listener, Arc::new(cache)));
        addr
    }

    /// 发送原始请求并读取完整响应（服务器在响应后关闭连接）
    async fn send_request(addr: SocketAddr, request: &[u8]) -> Result<String, String> {
        let mut stream = TcpStream::connect(addr).await.map_err(|e| e.to_string())?;
        stream.write_all(request).await.map_err(|e| e.to_string())?;

        let mut buffer = Vec::new();
        // 设置硬超时，防止服务器挂起时测试永久阻塞
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buffer))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn extract_status_code(response: &str) -> u16 {
        response
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_served_file_is_reachable() {
        let dir = layout();
        let addr = start_server(cache_for(&dir)).await;

        let response = send_request(addr, b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(extract_status_code(&response), 200);
        assert!(response.ends_with("<h1>hello</h1>"));
    }

    #[tokio::test]
    async fn test_path_traversal_simple() {
        let dir = layout();
        let addr = start_server(cache_for(&dir)).await;

        let attacks = [
            "GET /../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /../../etc/passwd HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /./../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET //../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
        ];
        for attack in attacks {
            if let Ok(response) = send_request(addr, attack.as_bytes()).await {
                assert_eq!(extract_status_code(&response), 404, "{}", attack);
                assert!(!response.contains(SECRET));
            }
        }
    }

    #[tokio::test]
    async fn test_path_traversal_encoded() {
        let dir = layout();
        let addr = start_server(cache_for(&dir)).await;

        let attacks = [
            "GET /%2e%2e%2fsecret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /..%2fsecret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /%2e%2e/%2e%2e/etc/passwd HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /..%5csecret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
        ];
        for attack in attacks {
            if let Ok(response) = send_request(addr, attack.as_bytes()).await {
                assert_ne!(extract_status_code(&response), 200, "{}", attack);
                assert!(!response.contains(SECRET));
            }
        }
    }

    #[tokio::test]
    async fn test_traversal_never_reaches_the_store() {
        let dir = layout();
        let cache = cache_for(&dir);

        for path in ["/../secret.txt", "/%2e%2e/secret.txt", "/..%2f..%2fetc%2fpasswd"] {
            let outcome = cache.handle(&Request::new(HttpRequestMethod::Get, path), 0).await;
            assert!(matches!(outcome, Outcome::NotHandled), "{}", path);
        }
        assert!(!cache.store().keys().iter().any(|key| key.contains("secret")));
    }

    #[tokio::test]
    async fn test_hidden_files_are_not_loaded() {
        let dir = layout();
        let cache = cache_for(&dir);
        assert!(!cache.store().contains("/.env"));

        for path in ["/.env", "/%2eenv", "/sub/../.env"] {
            let outcome = cache.handle(&Request::new(HttpRequestMethod::Get, path), 0).await;
            assert!(matches!(outcome, Outcome::NotHandled), "{}", path);
        }
        assert!(!cache.store().contains("/.env"));
    }

    #[tokio::test]
    async fn test_null_byte_injection() {
        let dir = layout();
        let addr = start_server(cache_for(&dir)).await;

        let attacks: [&[u8]; 2] = [
            b"GET /index.html\0.jpg HTTP/1.1\r\nHost: localhost\r\n\r\n",
            b"GET /index.html%00.jpg HTTP/1.1\r\nHost: localhost\r\n\r\n",
        ];
        for attack in attacks {
            if let Ok(response) = send_request(addr, attack).await {
                let status = extract_status_code(&response);
                assert!(status == 404 || status == 400, "应该拒绝空字节注入");
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_requests_get_400() {
        let dir = layout();
        let addr = start_server(cache_for(&dir)).await;

        let malformed: [&[u8]; 4] = [
            b"GARBAGE\r\n\r\n",
            b"GET /index.html\r\n\r\n",
            b"GET /index.html HTTP/9.9\r\n\r\n",
            &[0xff, 0xfe, 0x0d, 0x0a, 0x0d, 0x0a],
        ];
        for request in malformed {
            let response = send_request(addr, request).await.unwrap();
            assert_eq!(extract_status_code(&response), 400);
        }
    }

    #[tokio::test]
    async fn test_oversized_request_line() {
        let dir = layout();
        let addr = start_server(cache_for(&dir)).await;

        let long_path = "a".repeat(64 * 1024);
        let request = format!("GET /{} HTTP/1.1\r\nHost: localhost\r\n\r\n", long_path);
        // 服务器可能在读完之前关闭连接，连接被重置也视为防御成功
        if let Ok(response) = send_request(addr, request.as_bytes()).await {
            let status = extract_status_code(&response);
            assert!(status == 400 || status == 0, "超长请求行应被拒绝，实际为{}", status);
        }
    }

    #[tokio::test]
    async fn test_non_get_methods_pass_through() {
        let dir = layout();
        let addr = start_server(cache_for(&dir)).await;

        for method in ["POST", "PUT", "DELETE", "OPTIONS"] {
            let request = format!("{} /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n", method);
            let response = send_request(addr, request.as_bytes()).await.unwrap();
            assert_eq!(extract_status_code(&response), 404, "{}", method);
        }
    }
}

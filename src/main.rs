// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态缓存服务器
//!
//! 加载配置、预热缓存，然后在 Tokio 运行时上接收连接。
//! 每个请求交给 [`StaticCache`] 处理，缓存放行的请求返回 404。

use static_cache::{server, Config, StaticCache};

use log::{error, info};
use tokio::{net::TcpListener, runtime::Builder};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::Arc,
    time::Instant,
};

const CONFIG_FILE: &str = "config/static-cache.toml";
const LOG_CONFIG_FILE: &str = "config/log4rs.yaml";

fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file(LOG_CONFIG_FILE, Default::default()) {
        eprintln!("无法从{}初始化日志系统：{}", LOG_CONFIG_FILE, e);
        process::exit(1);
    }

    // 2. 加载配置，配置文件缺失时使用默认值
    let config = match Config::from_toml(CONFIG_FILE) {
        Ok(config) => {
            info!("配置文件已载入");
            config
        }
        Err(e) => {
            error!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("root directory: {}", config.root_directory());

    // 3. 根据配置分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    // 4. 预热缓存。预加载失败时不对外提供服务
    let start_time = Instant::now();
    let cache = match StaticCache::new(config.options()) {
        Ok(cache) => cache.with_chunk_size(config.chunk_size()),
        Err(e) => {
            error!("缓存初始化失败：{}", e);
            process::exit(1);
        }
    };
    info!(
        "缓存初始化完成，共{}个条目，用时{}ms",
        cache.store().len(),
        start_time.elapsed().as_millis()
    );
    let cache = Arc::new(cache);

    runtime.block_on(async move {
        // 5. 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
        let port = config.port();
        let address = match config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        let socket = SocketAddrV4::new(address, port);
        let listener = match TcpListener::bind(socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定端口：{}，错误：{}", port, e);
                process::exit(1);
            }
        };
        info!("服务端将在{}上监听Socket连接", socket);

        // 6. 主事件循环
        if let Err(e) = server::serve(listener, cache).await {
            error!("接收连接时遇到错误：{}", e);
        }
    });
}

//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{http::StatusCode, routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use puch::config::{GreenConfig, RedConfig};
use puch::{GreenServer, RedServer, Shutdown};

async fn local_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start green on an ephemeral port.
pub async fn spawn_green(config: GreenConfig, shutdown: &Shutdown) -> SocketAddr {
    let (listener, addr) = local_listener().await;
    let server = GreenServer::new(config);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    addr
}

/// Start red on an ephemeral port, calling `upstream`.
pub async fn spawn_red(
    mut config: RedConfig,
    upstream: SocketAddr,
    shutdown: &Shutdown,
) -> SocketAddr {
    config.upstream.base_url = format!("http://{}", upstream);
    let (listener, addr) = local_listener().await;
    let server = RedServer::new(config).unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    addr
}

/// Start a programmable upstream answering `/puched` with whatever `f` returns.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (StatusCode, &'static str)> + Send + 'static,
{
    let f = Arc::new(f);
    let router = Router::new().route(
        "/puched",
        get(move || {
            let f = f.clone();
            async move { f().await }
        }),
    );

    let (listener, addr) = local_listener().await;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// A port with nothing listening on it.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn get_json(client: &reqwest::Client, url: String) -> (u16, serde_json::Value) {
    let res = client.get(url).send().await.expect("service unreachable");
    let status = res.status().as_u16();
    let body = res.json().await.unwrap_or(serde_json::Value::Null);
    (status, body)
}

//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rules_proxy::config::ProxyConfig;
use rules_proxy::http::HttpServer;
use rules_proxy::lifecycle::Shutdown;
use rules_proxy::rules::RuleStore;

/// Request line and headers as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Mock response: status, extra headers, body.
pub type MockResponse = (u16, Vec<(String, String)>, String);

pub async fn read_head(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&buf).to_string();
    let mut lines = text.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    Some(SeenRequest {
        method,
        target,
        headers,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Start a programmable mock backend on a free loopback port.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(SeenRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(seen) = read_head(&mut socket).await else {
                    return;
                };
                let (status, headers, body) = f(seen);
                let mut response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                    status,
                    reason(status),
                    body.len()
                );
                for (name, value) in headers {
                    response.push_str(&format!("{}: {}\r\n", name, value));
                }
                response.push_str("\r\n");
                response.push_str(&body);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Mock framework dev server echoing `METHOD target` and a few request headers.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|seen| {
        let echoed: Vec<(String, String)> = ["x-request-id", "x-forwarded-host", "x-forwarded-proto"]
            .iter()
            .filter_map(|name| {
                seen.header(name)
                    .map(|v| (format!("x-echo-{}", name.trim_start_matches("x-")), v.to_string()))
            })
            .collect();
        (200, echoed, format!("{} {}", seen.method, seen.target))
    })
    .await
}

/// Mock dev server accepting WebSocket upgrades and echoing raw bytes.
pub async fn start_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_head(&mut socket).await.is_none() {
                    return;
                }
                let handshake = "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
                if socket.write_all(handshake.as_bytes()).await.is_err() {
                    return;
                }
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Mock backend that accepts connections, reads the request and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// A running proxy bound to a free loopback port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub store: Arc<RuleStore>,
    pub shutdown: Arc<Shutdown>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config for a project rooted at `dir`.
pub fn project_config(dir: &Path, framework: Option<SocketAddr>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.project.project_dir = dir.to_path_buf();
    config.project.framework_url = framework.map(|addr| format!("http://{}", addr));
    config.project.watch = false;
    config.timeouts.upstream_secs = 5;
    config
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let store = Arc::new(RuleStore::load(config.project.clone()).unwrap());
    let server = HttpServer::new(config, store.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestProxy {
        addr,
        store,
        shutdown,
    }
}

/// Client that never follows redirects nor uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

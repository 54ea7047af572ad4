//! Minimal HTTP/1.1 responder for tests
//!
//! Routes by path prefix:
//! - `/slow/...` waits five seconds before answering 200
//! - `/missing/...` answers 404
//! - `/flaky/...` answers HEAD with 200 but GET with 500
//! - anything else answers 200 with body `hello <path>`
//!
//! Every response carries `x-tag: a` and `x-tag: b`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = respond(stream).await;
                });
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Pattern fragment matching this server's origin
    pub fn origin_pattern(&self) -> String {
        format!(r"http://127\.0\.0\.1:{}", self.addr.port())
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn respond(mut stream: TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or("/").to_string();

    let (status, reason) = if path.starts_with("/slow/") {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, "OK")
    } else if path.starts_with("/missing/") {
        (404, "Not Found")
    } else if path.starts_with("/flaky/") && method == "GET" {
        (500, "Internal Server Error")
    } else {
        (200, "OK")
    };

    let body = format!("hello {}", path);
    let mut response = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: text/html\r\nx-tag: a\r\nx-tag: b\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    if method != "HEAD" {
        response.push_str(&body);
    }

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

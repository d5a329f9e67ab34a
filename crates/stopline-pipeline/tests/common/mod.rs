//! Minimal HTTP fixture server for probe and smoke integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Handler: (method, path, hit number) -> (status, body).
pub type Handler = Arc<dyn Fn(&str, &str, usize) -> (u16, String) + Send + Sync>;

pub struct FixtureServer {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl FixtureServer {
    /// Serve on an ephemeral port with a custom handler.
    pub async fn start(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
        Self::start_on(listener, handler)
    }

    /// Serve on an already-bound listener (used to simulate a service that
    /// starts listening late).
    pub fn start_on(listener: TcpListener, handler: Handler) -> Self {
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_srv = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    break;
                };
                let hit = hits_srv.fetch_add(1, Ordering::SeqCst) + 1;
                let handler = handler.clone();
                tokio::spawn(async move {
                    handle_connection(sock, handler, hit).await;
                });
            }
        });

        Self { addr, hits }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn handle_connection(mut sock: TcpStream, handler: Handler, hit: usize) {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut tmp = [0u8; 1024];

    // Read until the header terminator, then drain the declared body.
    let (method, path) = loop {
        let n = match sock.read(&mut tmp).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&tmp[..n]);

        if let Some(pos) = find_terminator(&buf) {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let lower = line.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                })
                .unwrap_or(0);

            let mut body_len = buf.len() - pos - 4;
            while body_len < content_length {
                let n = match sock.read(&mut tmp).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                body_len += n;
            }

            let mut parts = head.lines().next().unwrap_or("").split_whitespace();
            let method = parts.next().unwrap_or("").to_string();
            let path = parts.next().unwrap_or("").to_string();
            break (method, path);
        }
    };

    let (status, body) = handler(&method, &path, hit);
    let response = format!(
        "HTTP/1.1 {} OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = sock.write_all(response.as_bytes()).await;
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

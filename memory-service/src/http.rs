//! Minimal hand-rolled HTTP/1.1 listener (spec §6), in the teacher's
//! `monitoring::metrics` HTTP server idiom: raw `tokio::net::TcpListener`,
//! no new web framework dependency, since the transport layer itself is out
//! of scope for this service.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use memory_core::embeddings::EmbeddingProvider;
use memory_core::error::Error;
use memory_core::graph::GraphStore;
use memory_core::invalidator::Invalidator;
use memory_core::pyramid::PyramidCompressor;
use memory_core::NerProbe;

use crate::handlers;

/// Shared application state handed to every connection.
pub struct AppState {
    pub store: Box<dyn GraphStore>,
    pub embeddings: Box<dyn EmbeddingProvider>,
    pub ner: Option<Box<dyn NerProbe>>,
    pub compressor: PyramidCompressor,
    pub invalidator: Invalidator,
}

/// Owns the accept loop's join handle; aborts it on drop, matching the
/// teacher's `MetricsHttpServer` lifecycle.
pub struct Server {
    handle: Option<JoinHandle<()>>,
}

impl Server {
    #[must_use]
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Bind `addr` and start accepting connections, spawning one task per
    /// connection.
    pub async fn start(&mut self, addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "memory service HTTP surface listening");

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, peer_addr)) = listener.accept().await else {
                    error!("failed to accept connection");
                    continue;
                };
                let state = state.clone();
                tokio::spawn(handle_connection(stream, peer_addr, state));
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("memory service HTTP surface stopped");
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_connection(mut stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    if let Err(e) = handle_connection_impl(&mut stream, &state).await {
        warn!(%peer_addr, error = %e, "error handling connection");
    }
}

struct ParsedRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

const MAX_HEADER_BYTES: usize = 8192;
const MAX_BODY_BYTES: usize = 1_000_000;

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<ParsedRequest>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Ok(None);
        }
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = header_text.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let content_length: usize = lines
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
        .min(MAX_BODY_BYTES);

    let body_start = (header_end + 4).min(buf.len());
    let mut body = buf[body_start..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Some(ParsedRequest { method, path, body }))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn handle_connection_impl(stream: &mut TcpStream, state: &Arc<AppState>) -> std::io::Result<()> {
    let Some(request) = read_request(stream).await? else {
        return Ok(());
    };

    let (status, body) = route(state, &request).await;
    write_json_response(stream, status, &body).await
}

async fn route(state: &Arc<AppState>, request: &ParsedRequest) -> (u16, serde_json::Value) {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => match handlers::health(state.store.as_ref(), state.ner.as_deref()).await {
            Ok(resp) => (200, serde_json::to_value(resp).unwrap_or_default()),
            Err(err) => error_body(err),
        },
        ("POST", "/ingest") => match parse_body::<handlers::IngestHttpRequest>(&request.body) {
            Ok(req) => match handlers::ingest(
                state.store.as_ref(),
                state.embeddings.as_ref(),
                state.ner.as_deref(),
                &state.compressor,
                &state.invalidator,
                req,
            )
            .await
            {
                Ok(resp) => (200, serde_json::to_value(resp).unwrap_or_default()),
                Err(err) => error_body(err),
            },
            Err(msg) => (400, serde_json::json!({ "error": msg })),
        },
        ("POST", "/recall") => match parse_body::<handlers::RecallHttpRequest>(&request.body) {
            Ok(req) => match handlers::recall(state.store.as_ref(), state.embeddings.as_ref(), req).await {
                Ok(resp) => (200, serde_json::to_value(resp).unwrap_or_default()),
                Err(err) => error_body(err),
            },
            Err(msg) => (400, serde_json::json!({ "error": msg })),
        },
        ("POST", "/context") => match parse_body::<handlers::ContextHttpRequest>(&request.body) {
            Ok(req) => match handlers::context(state.store.as_ref(), state.embeddings.as_ref(), &state.compressor, req).await {
                Ok(resp) => (200, serde_json::to_value(resp).unwrap_or_default()),
                Err(err) => error_body(err),
            },
            Err(msg) => (400, serde_json::json!({ "error": msg })),
        },
        _ => (404, serde_json::json!({ "error": "not found" })),
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, String> {
    serde_json::from_slice(body).map_err(|e| format!("malformed request body: {e}"))
}

fn error_body(err: Error) -> (u16, serde_json::Value) {
    let status = match &err {
        Error::InvalidInput(_) => 400,
        Error::NotFound(_) => 404,
        Error::Canceled => 504,
        Error::Dependency(_) | Error::Storage(_) | Error::Serialization(_) | Error::Relation(_) => 500,
    };
    (status, serde_json::json!({ "error": err.to_string() }))
}

async fn write_json_response(stream: &mut TcpStream, status: u16, body: &serde_json::Value) -> std::io::Result<()> {
    let reason = reason_phrase(status);
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&payload).await?;
    stream.flush().await
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_header_end_locates_the_blank_line() {
        let buf = b"GET /health HTTP/1.1\r\nHost: x\r\n\r\n";
        assert_eq!(find_header_end(buf), Some(buf.len() - 4));
    }

    #[test]
    fn error_body_maps_invalid_input_to_400() {
        let (status, _) = error_body(Error::InvalidInput("bad".to_string()));
        assert_eq!(status, 400);
    }

    #[test]
    fn error_body_maps_storage_errors_to_500() {
        let (status, _) = error_body(Error::Storage("disk full".to_string()));
        assert_eq!(status, 500);
    }
}

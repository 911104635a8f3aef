//! End-to-end exercise of the hand-rolled HTTP listener over a real TCP
//! connection, backed by the in-memory store and fake collaborators.

use std::net::SocketAddr;
use std::sync::Arc;

use memory_core::invalidator::Invalidator;
use memory_core::pyramid::PyramidCompressor;
use memory_service::{AppState, Server};
use test_utils::{FakeEmbeddingProvider, FakeNerProbe, InMemoryStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start_test_server() -> SocketAddr {
    let state = Arc::new(AppState {
        store: Box::new(InMemoryStore::new()),
        embeddings: Box::new(FakeEmbeddingProvider::new()),
        ner: Some(Box::new(FakeNerProbe::healthy_with_no_entities())),
        compressor: PyramidCompressor::new(),
        invalidator: Invalidator::new(),
    });

    let mut server = Server::new();
    let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound = listener.local_addr().unwrap();
    drop(listener);
    server.start(bound, state).await.unwrap();
    // Leak the server so it stays alive for the test's lifetime; the OS
    // reclaims the port when the process exits.
    std::mem::forget(server);
    bound
}

async fn send(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn health_endpoint_returns_200_with_a_json_body() {
    let addr = start_test_server().await;
    let response = send(addr, "GET /health HTTP/1.1\r\nHost: x\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"status\":\"ok\""));
}

#[tokio::test]
async fn ingest_endpoint_accepts_a_minimal_body() {
    let addr = start_test_server().await;
    let body = r#"{"content":"hello from a test"}"#;
    let request = format!(
        "POST /ingest HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = send(addr, &request).await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("episode_id"));
}

#[tokio::test]
async fn ingest_endpoint_rejects_blank_content_with_400() {
    let addr = start_test_server().await;
    let body = r#"{"content":""}"#;
    let request = format!(
        "POST /ingest HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = send(addr, &request).await;
    assert!(response.starts_with("HTTP/1.1 400"));
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let addr = start_test_server().await;
    let response = send(addr, "GET /nope HTTP/1.1\r\nHost: x\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404"));
}

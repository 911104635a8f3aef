//! Binary entry point: wires environment configuration to a redb-backed
//! store, an Ollama-compatible model client, an optional NER sidecar, and
//! the HTTP surface, then runs until interrupted.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use memory_core::config::Config;
use memory_core::invalidator::Invalidator;
use memory_core::pyramid::PyramidCompressor;
use memory_service::clients::{HttpEmbeddingProvider, HttpNerProbe};
use memory_service::{AppState, Server};
use memory_storage_redb::RedbStore;
use tracing::info;

/// Dimensionality `nomic-embed-text` (the default embedding model) returns.
/// Overridden implicitly by swapping `MEMORY_EMBEDDING_MODEL` and adjusting
/// this constant in step; the service does not probe it at runtime.
const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    let store = RedbStore::new(&Path::new(&config.data_dir).join("graph.redb")).await?;
    let embeddings = HttpEmbeddingProvider::new(
        config.model_endpoint.clone(),
        config.embedding_model.clone(),
        config.generation_model.clone(),
        DEFAULT_EMBEDDING_DIMENSION,
        config.dependency_timeout,
    )?;
    let ner = config.ner_url.as_ref().map(|url| {
        Box::new(HttpNerProbe::new(url.clone(), config.dependency_timeout)) as Box<dyn memory_core::NerProbe>
    });

    let state = Arc::new(AppState {
        store: Box::new(store),
        embeddings: Box::new(embeddings),
        ner,
        compressor: PyramidCompressor::new(),
        invalidator: Invalidator::new(),
    });

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let mut server = Server::new();
    server.start(addr, state).await?;

    info!("memory service running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    server.stop();

    Ok(())
}

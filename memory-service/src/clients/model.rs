//! Embedding/generation client for an Ollama-compatible endpoint (the
//! config defaults point at `http://localhost:11434` with `nomic-embed-text`
//! and `llama3.1`, Ollama's own defaults).

use async_trait::async_trait;
use memory_core::{EmbeddingProvider, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Talks to an Ollama-compatible `/api/embeddings` and `/api/generate`
/// endpoint. Any transport or decode failure becomes an
/// [`Error::Dependency`] so callers can apply the degrade policy in spec §7.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    embedding_model: String,
    generation_model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    /// Build a client against `endpoint` with the given model names and
    /// per-call timeout. `dimension` is the size the embedding model is
    /// known to return; it is not discovered at runtime.
    pub fn new(
        endpoint: impl Into<String>,
        embedding_model: impl Into<String>,
        generation_model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Dependency(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            embedding_model: embedding_model.into(),
            generation_model: generation_model.into(),
            dimension,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.endpoint.trim_end_matches('/'));
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Dependency(format!("embedding request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Dependency(format!("embedding endpoint returned an error: {e}")))?
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| Error::Dependency(format!("malformed embedding response: {e}")))?;
        Ok(resp.embedding)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let body = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Dependency(format!("generation request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Dependency(format!("generation endpoint returned an error: {e}")))?
            .json::<GenerateResponse>()
            .await
            .map_err(|e| {
                warn!(error = %e, "generation endpoint response did not match the expected shape");
                Error::Dependency(format!("malformed generation response: {e}"))
            })?;
        Ok(resp.response)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

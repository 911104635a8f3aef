//! Client for the optional NER pre-filter sidecar (spec §4.7 step 4).

use async_trait::async_trait;
use memory_core::{NerProbe, NerSpan, Result};
use serde::Deserialize;
use std::time::Duration;

/// Talks to a sidecar exposing `GET /health` and `POST /spans`. Treated as
/// absent (never consulted) whenever the health check fails, per the
/// Ingestor's Dependency-absence handling.
pub struct HttpNerProbe {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNerProbe {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpansResponse {
    spans: Vec<NerSpan>,
}

#[async_trait]
impl NerProbe for HttpNerProbe {
    async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        matches!(self.client.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    async fn spans(&self, text: &str) -> Result<Vec<NerSpan>> {
        let url = format!("{}/spans", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| memory_core::Error::Dependency(format!("NER sidecar request failed: {e}")))?
            .error_for_status()
            .map_err(|e| memory_core::Error::Dependency(format!("NER sidecar returned an error: {e}")))?
            .json::<SpansResponse>()
            .await
            .map_err(|e| memory_core::Error::Dependency(format!("malformed NER sidecar response: {e}")))?;
        Ok(resp.spans)
    }
}

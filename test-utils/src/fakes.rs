//! Deterministic test doubles for the two external dependencies every
//! algorithm in `memory-core` is written against an interface for.

use async_trait::async_trait;
use memory_core::{EmbeddingProvider, Error, NerProbe, NerSpan, Result};
use parking_lot::Mutex;

/// Deterministic, hash-based embedding provider. `embed` never fails and
/// never calls out to anything; `generate` returns a queued canned response
/// (FIFO), or a caller-supplied default if the queue is empty, so tests can
/// script exactly what "the model said" for a given call.
pub struct FakeEmbeddingProvider {
    dimension: usize,
    responses: Mutex<Vec<String>>,
    default_response: String,
    fail_generate: bool,
}

impl FakeEmbeddingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: 8,
            responses: Mutex::new(Vec::new()),
            default_response: "{}".to_string(),
            fail_generate: false,
        }
    }

    /// Queue a response to be returned by the next `generate` call.
    #[must_use]
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().push(response.into());
        self
    }

    /// Make every `generate` call fail with a `Dependency` error, to
    /// exercise a component's fail-open/fail-closed behavior.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_generate = true;
        self
    }
}

impl Default for FakeEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimension))
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        if self.fail_generate {
            return Err(Error::Dependency("fake generation model unavailable".into()));
        }
        let mut queue = self.responses.lock();
        if queue.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(queue.remove(0))
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// A deterministic, non-cryptographic bag-of-characters embedding: same
/// text always yields the same vector, and similar text yields similar
/// vectors, which is all the spreading-activation and resolution tests need.
fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut buckets = vec![0.0_f32; dimension];
    for (i, byte) in text.bytes().enumerate() {
        buckets[(byte as usize + i) % dimension] += 1.0;
    }
    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for b in &mut buckets {
            *b /= norm;
        }
    }
    buckets
}

/// A scriptable NER sidecar probe.
pub struct FakeNerProbe {
    healthy: bool,
    spans: Vec<NerSpan>,
}

impl FakeNerProbe {
    #[must_use]
    pub fn new(healthy: bool, spans: Vec<NerSpan>) -> Self {
        Self { healthy, spans }
    }

    #[must_use]
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            spans: Vec::new(),
        }
    }

    #[must_use]
    pub fn healthy_with_no_entities() -> Self {
        Self {
            healthy: true,
            spans: Vec::new(),
        }
    }
}

#[async_trait]
impl NerProbe for FakeNerProbe {
    async fn healthy(&self) -> bool {
        self.healthy
    }

    async fn spans(&self, _text: &str) -> Result<Vec<NerSpan>> {
        Ok(self.spans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic() {
        let provider = FakeEmbeddingProvider::new();
        let a = provider.embed("hello").await.unwrap();
        let b = provider.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn generate_returns_queued_responses_in_order() {
        let provider = FakeEmbeddingProvider::new()
            .with_response("first")
            .with_response("second");
        assert_eq!(provider.generate("p").await.unwrap(), "first");
        assert_eq!(provider.generate("p").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn failing_provider_returns_a_dependency_error() {
        let provider = FakeEmbeddingProvider::new().failing();
        let err = provider.generate("p").await.unwrap_err();
        assert!(err.has_safe_fallback());
    }
}

//! Contracts for the external collaborators (spec §1): the embedding
//! provider, the generation LLM, and the NER sidecar. Only their *contracts*
//! live in this crate — no HTTP client, no model loading.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Text → fixed-dim float vector, and text → short generated text (C2).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text. Callers pass a cancellation deadline
    /// via the ambient async runtime (e.g. `tokio::time::timeout`); this
    /// trait does not thread one through explicitly so fakes stay simple.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Ask the generation model to produce free text from a prompt (used by
    /// the Pyramid Compressor and, indirectly, the Invalidator's JSON
    /// prompts).
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Dimensionality of vectors this provider returns. Used by stores to
    /// size embedding columns.
    fn dimension(&self) -> usize;
}

/// A labeled span found by the NER sidecar (C3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerSpan {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
}

/// Text → list of labeled spans, plus a health probe (C3). Optional: the
/// Ingestor treats an absent or unhealthy sidecar as "skip the pre-filter,
/// always run deep extraction" (spec §4.7 step 4, §7 Dependency handling).
#[async_trait]
pub trait NerProbe: Send + Sync {
    /// Whether the sidecar currently responds to its health check.
    async fn healthy(&self) -> bool;

    /// Pre-filter spans for `text`. Only called when [`Self::healthy`]
    /// returned `true` moments earlier.
    async fn spans(&self, text: &str) -> Result<Vec<NerSpan>>;
}

/// Cosine similarity between two equal-length embeddings, in `[-1.0, 1.0]`.
/// Returns `0.0` for empty or mismatched-length inputs rather than panicking,
/// since embeddings arrive from an external provider whose failure modes are
/// not under this crate's control.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-12 {
        0.0
    } else {
        (dot / denom) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![0.3, 0.1, 0.9, -0.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_have_similarity_minus_one() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, -3.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-5);
    }

    #[test]
    fn mismatched_lengths_return_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn empty_vectors_return_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}

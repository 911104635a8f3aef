//! Error types for the memory core.
//!
//! Mirrors the error *kinds* from the design: [`Error::InvalidInput`],
//! [`Error::Dependency`], [`Error::Storage`], [`Error::NotFound`], and
//! [`Error::Canceled`]. Lower-level failures are wrapped with context at
//! each boundary rather than discarded.

use uuid::Uuid;

/// Result type alias used throughout the memory core.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds produced by the graph model and algorithms.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing required field, malformed input, or an out-of-range parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embedding provider, generation LLM, or NER sidecar failed or
    /// returned something unusable. Callers with a safe fallback should
    /// degrade rather than propagate this upward (see spec §7).
    #[error("dependency unavailable: {0}")]
    Dependency(String),

    /// The persistent store rejected a write or hit a constraint violation.
    #[error("storage error: {0}")]
    Storage(String),

    /// An id was named explicitly by the caller but does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation's deadline elapsed or it was explicitly canceled.
    #[error("operation canceled")]
    Canceled,

    /// A row failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Relation to invalidate does not exist, or violates the active-edge
    /// bookkeeping invariants.
    #[error("relation error: {0}")]
    Relation(String),
}

impl Error {
    /// Construct a [`Error::NotFound`] for a missing episode id.
    #[must_use]
    pub fn episode_not_found(id: Uuid) -> Self {
        Error::NotFound(format!("episode {id}"))
    }

    /// Construct a [`Error::NotFound`] for a missing entity id.
    #[must_use]
    pub fn entity_not_found(id: Uuid) -> Self {
        Error::NotFound(format!("entity {id}"))
    }

    /// Whether the caller may retry this operation with backoff.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Dependency(_) | Error::Storage(_))
    }

    /// Whether this failure is safe to degrade around rather than abort the
    /// whole ingest/recall request for (spec §7 propagation policy).
    #[must_use]
    pub fn has_safe_fallback(&self) -> bool {
        matches!(self, Error::Dependency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_errors_are_recoverable_and_degradable() {
        let err = Error::Dependency("embedding provider timed out".into());
        assert!(err.is_recoverable());
        assert!(err.has_safe_fallback());
    }

    #[test]
    fn storage_errors_are_recoverable_but_not_degradable() {
        let err = Error::Storage("write conflict".into());
        assert!(err.is_recoverable());
        assert!(!err.has_safe_fallback());
    }

    #[test]
    fn invalid_input_is_neither() {
        let err = Error::InvalidInput("content must not be empty".into());
        assert!(!err.is_recoverable());
        assert!(!err.has_safe_fallback());
    }

    #[test]
    fn not_found_helpers_format_the_id() {
        let id = Uuid::nil();
        let err = Error::episode_not_found(id);
        assert_eq!(err.to_string(), format!("not found: episode {id}"));
    }
}

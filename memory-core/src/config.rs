//! Environment-driven configuration (spec §6 "Environment").
//!
//! None of these values are secrets; everything has a documented default so
//! the service runs out of the box with no environment configured at all.

use std::time::Duration;

/// Runtime configuration for the memory service.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// TCP port the HTTP surface listens on. `MEMORY_PORT`, default `8077`.
    pub port: u16,
    /// Directory the persistent store writes its files under.
    /// `MEMORY_DATA_DIR`, default `./data`.
    pub data_dir: String,
    /// Base URL of the embedding/generation endpoint. `MEMORY_MODEL_ENDPOINT`,
    /// default `http://localhost:11434`.
    pub model_endpoint: String,
    /// Model name used for embeddings. `MEMORY_EMBEDDING_MODEL`, default
    /// `nomic-embed-text`.
    pub embedding_model: String,
    /// Model name used for generation (summaries, extraction, invalidation
    /// prompts). `MEMORY_GENERATION_MODEL`, default `llama3.1`.
    pub generation_model: String,
    /// Base URL of the optional NER sidecar. `MEMORY_NER_URL`, unset by
    /// default (pre-filter disabled).
    pub ner_url: Option<String>,
    /// Deadline applied to every external collaborator call (embedding,
    /// generation, NER). `MEMORY_DEPENDENCY_TIMEOUT_MS`, default `10000`.
    pub dependency_timeout: Duration,
    /// Half-life used by the coarse-cadence activation decay job.
    /// `MEMORY_ACTIVATION_HALF_LIFE_HOURS`, default `72`.
    pub activation_half_life: chrono::Duration,
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// documented defaults for anything unset. Malformed numeric values fall
    /// back to their default rather than failing startup, since none of
    /// these values are load-bearing for correctness, only tuning.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env_parse("MEMORY_PORT").unwrap_or(defaults.port),
            data_dir: std::env::var("MEMORY_DATA_DIR").unwrap_or(defaults.data_dir),
            model_endpoint: std::env::var("MEMORY_MODEL_ENDPOINT")
                .unwrap_or(defaults.model_endpoint),
            embedding_model: std::env::var("MEMORY_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            generation_model: std::env::var("MEMORY_GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            ner_url: std::env::var("MEMORY_NER_URL").ok().or(defaults.ner_url),
            dependency_timeout: env_parse::<u64>("MEMORY_DEPENDENCY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.dependency_timeout),
            activation_half_life: env_parse::<i64>("MEMORY_ACTIVATION_HALF_LIFE_HOURS")
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.activation_half_life),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8077,
            data_dir: "./data".to_string(),
            model_endpoint: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            generation_model: "llama3.1".to_string(),
            ner_url: None,
            dependency_timeout: Duration::from_secs(10),
            activation_half_life: chrono::Duration::hours(
                crate::constants::retrieval::DEFAULT_HALF_LIFE_HOURS as i64,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_with_no_environment_set() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8077);
        assert!(cfg.ner_url.is_none());
    }

    #[test]
    fn env_parse_falls_back_on_missing_key() {
        assert_eq!(env_parse::<u16>("MEMORY_DEFINITELY_UNSET_KEY"), None);
    }
}

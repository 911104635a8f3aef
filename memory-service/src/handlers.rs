//! Request/response shapes and handler logic for the four HTTP endpoints
//! (spec §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use memory_core::constants::context as context_constants;
use memory_core::embeddings::EmbeddingProvider;
use memory_core::error::{Error, Result};
use memory_core::graph::GraphStore;
use memory_core::invalidator::Invalidator;
use memory_core::pyramid::PyramidCompressor;
use memory_core::retrieval::{self, ScoredTrace};
use memory_core::types::Entity;
use memory_core::{context, ingest, NerProbe};

// -- /health --------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ner_sidecar: bool,
    pub graph_stats: GraphStats,
}

/// Graph statistics surfaced on `/health`. `episode_count` is sampled (the
/// Graph Model has no count-only operation), capped at
/// [`STATS_EPISODE_SAMPLE_CAP`]; `trace_count` is exact since
/// `all_traces` already returns every trace.
#[derive(Debug, Serialize)]
pub struct GraphStats {
    pub episode_count: usize,
    pub trace_count: usize,
}

const STATS_EPISODE_SAMPLE_CAP: usize = 10_000;

pub async fn health(store: &dyn GraphStore, ner: Option<&dyn NerProbe>) -> Result<HealthResponse> {
    let episode_count = store.get_recent_episodes(None, STATS_EPISODE_SAMPLE_CAP).await?.len();
    let trace_count = store.all_traces().await?.len();
    let ner_sidecar = match ner {
        Some(probe) => probe.healthy().await,
        None => false,
    };

    Ok(HealthResponse {
        status: "ok".to_string(),
        ner_sidecar,
        graph_stats: GraphStats {
            episode_count,
            trace_count,
        },
    })
}

// -- /ingest ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IngestHttpRequest {
    pub content: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_author")]
    pub author: String,
    pub author_id: Option<String>,
    pub channel: Option<String>,
    pub reply_to: Option<Uuid>,
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_source() -> String {
    "http".to_string()
}

fn default_author() -> String {
    "unknown".to_string()
}

#[derive(Debug, Serialize)]
pub struct EntitySummary {
    pub id: Uuid,
    pub name: String,
    pub entity_type: String,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            entity_type: entity.entity_type.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestHttpResponse {
    pub episode_id: Uuid,
    pub short_id: String,
    pub entities: Vec<EntitySummary>,
    pub entropy_score: f32,
}

#[allow(clippy::too_many_arguments)]
pub async fn ingest(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    ner: Option<&dyn NerProbe>,
    compressor: &PyramidCompressor,
    invalidator: &Invalidator,
    request: IngestHttpRequest,
) -> Result<IngestHttpResponse> {
    if request.content.trim().is_empty() {
        return Err(Error::InvalidInput("content must not be empty".to_string()));
    }

    let outcome = ingest::ingest(
        store,
        embeddings,
        ner,
        compressor,
        invalidator,
        ingest::IngestRequest {
            content: request.content,
            source: request.source,
            author: request.author,
            author_id: request.author_id,
            channel: request.channel,
            reply_to: request.reply_to,
            timestamp_event: request.timestamp,
        },
    )
    .await?;

    Ok(IngestHttpResponse {
        episode_id: outcome.episode.id,
        short_id: outcome.episode.short_id,
        entities: outcome.entities.iter().map(EntitySummary::from).collect(),
        entropy_score: outcome.episode.entropy_score,
    })
}

// -- /recall ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RecallHttpRequest {
    pub query: String,
    pub limit: Option<usize>,
    #[serde(default)]
    pub context_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TraceSummary {
    pub id: Uuid,
    pub short_id: String,
    pub summary: String,
    pub activation: f32,
    pub strength: u32,
    pub created_at: DateTime<Utc>,
    pub score: f32,
}

impl From<&ScoredTrace> for TraceSummary {
    fn from(scored: &ScoredTrace) -> Self {
        Self {
            id: scored.trace.id,
            short_id: scored.trace.short_id.clone(),
            summary: scored.trace.summary.clone(),
            activation: scored.trace.activation,
            strength: scored.trace.strength,
            created_at: scored.trace.created_at,
            score: scored.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecallHttpResponse {
    pub traces: Vec<TraceSummary>,
}

pub async fn recall(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    request: RecallHttpRequest,
) -> Result<RecallHttpResponse> {
    if request.query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".to_string()));
    }

    let query_embedding = embeddings.embed(&request.query).await?;
    let k = retrieval::clamp_k(request.limit);
    let scored = retrieval::retrieve(store, &request.query, &query_embedding, &request.context_ids, k).await?;

    Ok(RecallHttpResponse {
        traces: scored.iter().map(TraceSummary::from).collect(),
    })
}

// -- /context ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ContextHttpRequest {
    pub channel: Option<String>,
    pub query: Option<String>,
    pub max_episodes: Option<usize>,
    pub max_traces: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ContextStats {
    pub episode_count: usize,
    pub retrieved_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ContextHttpResponse {
    pub recent_conversation: String,
    pub retrieved_memories: Vec<TraceSummary>,
    pub stats: ContextStats,
}

pub async fn context(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    compressor: &PyramidCompressor,
    request: ContextHttpRequest,
) -> Result<ContextHttpResponse> {
    let max_episodes = request.max_episodes.unwrap_or(context_constants::DEFAULT_MAX_EPISODES);
    let max_traces = request.max_traces.unwrap_or(context_constants::DEFAULT_MAX_TRACES);

    let query_embedding = match &request.query {
        Some(q) if !q.trim().is_empty() => Some(embeddings.embed(q).await?),
        _ => None,
    };
    let query_pair = match (&request.query, &query_embedding) {
        (Some(q), Some(e)) => Some((q.as_str(), e.as_slice())),
        _ => None,
    };

    let assembled = context::assemble(
        store,
        embeddings,
        compressor,
        request.channel.as_deref(),
        max_episodes,
        max_traces,
        query_pair,
        &[],
    )
    .await?;

    let episode_count = assembled.lines.len();
    let retrieved_count = assembled.retrieved.len();

    Ok(ContextHttpResponse {
        recent_conversation: assembled.render(),
        retrieved_memories: assembled.retrieved.iter().map(TraceSummary::from).collect(),
        stats: ContextStats {
            episode_count,
            retrieved_count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{FakeEmbeddingProvider, FakeNerProbe, InMemoryStore};

    #[tokio::test]
    async fn ingest_rejects_blank_content() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new();
        let compressor = PyramidCompressor::new();
        let invalidator = Invalidator::new();
        let err = ingest(
            &store,
            &embeddings,
            None,
            &compressor,
            &invalidator,
            IngestHttpRequest {
                content: "   ".to_string(),
                source: "http".to_string(),
                author: "tester".to_string(),
                author_id: None,
                channel: None,
                reply_to: None,
                timestamp: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn ingest_round_trips_through_the_store() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new();
        let ner = FakeNerProbe::healthy_with_no_entities();
        let compressor = PyramidCompressor::new();
        let invalidator = Invalidator::new();
        let response = ingest(
            &store,
            &embeddings,
            Some(&ner),
            &compressor,
            &invalidator,
            IngestHttpRequest {
                content: "hello there".to_string(),
                source: "http".to_string(),
                author: "tester".to_string(),
                author_id: None,
                channel: Some("general".to_string()),
                reply_to: None,
                timestamp: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(response.short_id.len(), 5);
        assert!(response.entities.is_empty());
    }

    #[tokio::test]
    async fn recall_rejects_blank_query() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new();
        let err = recall(
            &store,
            &embeddings,
            RecallHttpRequest {
                query: String::new(),
                limit: None,
                context_ids: Vec::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn recall_against_an_empty_graph_returns_no_traces() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new();
        let response = recall(
            &store,
            &embeddings,
            RecallHttpRequest {
                query: "blue bottle coffee".to_string(),
                limit: Some(5),
                context_ids: Vec::new(),
            },
        )
        .await
        .unwrap();
        assert!(response.traces.is_empty());
    }

    #[tokio::test]
    async fn context_renders_recent_episodes_oldest_first() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new();
        let compressor = PyramidCompressor::new();
        let invalidator = Invalidator::new();

        for content in ["first", "second"] {
            ingest::ingest(
                &store,
                &embeddings,
                None,
                &compressor,
                &invalidator,
                ingest::IngestRequest {
                    content: content.to_string(),
                    source: "http".to_string(),
                    author: "tester".to_string(),
                    author_id: None,
                    channel: None,
                    reply_to: None,
                    timestamp_event: None,
                },
            )
            .await
            .unwrap();
        }

        let response = context(
            &store,
            &embeddings,
            &compressor,
            ContextHttpRequest {
                channel: None,
                query: None,
                max_episodes: None,
                max_traces: None,
            },
        )
        .await
        .unwrap();
        assert!(response.recent_conversation.contains("first"));
        assert!(response.stats.episode_count >= 2);
    }

    #[tokio::test]
    async fn health_reports_ner_sidecar_status() {
        let store = InMemoryStore::new();
        let response = health(&store, Some(&FakeNerProbe::unhealthy())).await.unwrap();
        assert!(!response.ner_sidecar);
        assert_eq!(response.status, "ok");
    }
}

//! Ingestor (C10, spec §4.7).
//!
//! Orchestrates a single ingestion: classify, embed, persist the episode,
//! kick off summary pre-warming, and (unless the NER pre-filter reports no
//! entities) run deep extraction, resolution, linking, and invalidation.
//! The episode is durable before any entity work begins; a failure in
//! extraction, resolution, or invalidation degrades rather than aborts the
//! whole request (spec §7).

use chrono::Utc;
use tracing::{info, warn};

use crate::embeddings::{EmbeddingProvider, NerProbe};
use crate::error::Result;
use crate::extraction;
use crate::graph::{GraphStore, NewEntityRelation, NewEpisode};
use crate::invalidator::Invalidator;
use crate::pyramid::PyramidCompressor;
use crate::resolver;
use crate::types::{DialogueAct, Entity, Episode};
use crate::{constants, dialogue};

/// Caller-supplied fields for one ingestion. Everything the Ingestor itself
/// computes (dialogue act, entropy, embedding) is derived internally.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub content: String,
    pub source: String,
    pub author: String,
    pub author_id: Option<String>,
    pub channel: Option<String>,
    pub reply_to: Option<uuid::Uuid>,
    pub timestamp_event: Option<chrono::DateTime<Utc>>,
}

/// Outcome of one ingestion, surfaced back to the HTTP layer.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub episode: Episode,
    pub entities: Vec<Entity>,
}

/// Run the full ingestion pipeline for `request`.
#[allow(clippy::too_many_arguments)]
pub async fn ingest(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    ner: Option<&dyn NerProbe>,
    compressor: &PyramidCompressor,
    invalidator: &Invalidator,
    request: IngestRequest,
) -> Result<IngestOutcome> {
    if let Some(reply_to) = request.reply_to {
        if store.get_episode(reply_to).await?.is_none() {
            return Err(crate::error::Error::NotFound(format!(
                "reply_to episode {reply_to} does not exist"
            )));
        }
    }

    let act = dialogue::classify(&request.content);
    let embedding = embeddings.embed(&request.content).await?;

    let has_entities_hint = probe_has_entities(ner, &request.content).await;
    let entropy = dialogue::entropy_score(&request.content, act, has_entities_hint.unwrap_or(false));

    let episode = store
        .add_episode(NewEpisode {
            content: request.content.clone(),
            source: request.source,
            author: request.author,
            author_id: request.author_id,
            channel: request.channel,
            reply_to: request.reply_to,
            timestamp_event: request.timestamp_event,
            dialogue_act: act,
            entropy_score: entropy,
            embedding,
            token_count: request.content.split_whitespace().count() as u32,
        })
        .await?;

    prewarm_summaries(store, embeddings, compressor, &episode).await;

    if has_entities_hint == Some(false) {
        info!(episode_id = %episode.id, "NER pre-filter reported no entities, skipping deep extraction");
        return Ok(IngestOutcome {
            episode,
            entities: Vec::new(),
        });
    }

    let entities = run_extraction_and_linking(store, embeddings, invalidator, &episode).await;

    Ok(IngestOutcome { episode, entities })
}

/// Probe the NER sidecar, if present and healthy, for whether it sees any
/// entities at all. Returns `None` when the sidecar is absent or unhealthy,
/// in which case the Ingestor always runs deep extraction (spec §4.7 step
/// 4, §7 Dependency handling).
async fn probe_has_entities(ner: Option<&dyn NerProbe>, text: &str) -> Option<bool> {
    let ner = ner?;
    if !ner.healthy().await {
        return None;
    }
    match ner.spans(text).await {
        Ok(spans) => Some(!spans.is_empty()),
        Err(_) => None,
    }
}

/// Best-effort summary pre-warm (spec §4.7 step 3). A failure here never
/// affects the ingest response; the same coalescing map the lazy path uses
/// means a later `get_summary` call just finds the cached row instead of
/// recomputing it.
async fn prewarm_summaries(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    compressor: &PyramidCompressor,
    episode: &Episode,
) {
    for level in [crate::types::SummaryLevel::Short, crate::types::SummaryLevel::Medium] {
        if let Err(err) = compressor.get_summary(store, embeddings, episode, level).await {
            warn!(episode_id = %episode.id, ?level, error = %err, "summary pre-warm failed");
        }
    }
}

async fn run_extraction_and_linking(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    invalidator: &Invalidator,
    episode: &Episode,
) -> Vec<Entity> {
    let extraction = match extraction::extract(embeddings, &episode.content).await {
        Ok(e) => e,
        Err(err) => {
            warn!(episode_id = %episode.id, error = %err, "deep extraction failed, continuing without entities");
            return Vec::new();
        }
    };

    let mut resolved = Vec::with_capacity(extraction.entities.len());
    for mention in &extraction.entities {
        match resolver::resolve(store, embeddings, mention).await {
            Ok(outcome) => {
                if let Err(err) = store
                    .link_episode_to_entity(episode.id, outcome.entity.id)
                    .await
                {
                    warn!(error = %err, "failed to link episode to entity");
                }
                resolved.push(outcome.entity);
            }
            Err(err) => {
                warn!(error = %err, "entity resolution failed for a mention, skipping it");
            }
        }
    }

    for relation in &extraction.relations {
        let (Ok(subject_outcome), Ok(object_outcome)) = (
            resolver::resolve(store, embeddings, &relation.subject).await,
            resolver::resolve(store, embeddings, &relation.object).await,
        ) else {
            warn!("could not resolve both endpoints of an extracted relation, skipping it");
            continue;
        };

        let draft = NewEntityRelation {
            from_id: subject_outcome.entity.id,
            to_id: object_outcome.entity.id,
            relation_type: relation.relation_type.clone(),
            weight: relation.weight,
            valid_at: Utc::now(),
            source_episode_id: episode.id,
        };

        if let Err(err) = invalidator.insert_with_invalidation(store, embeddings, draft).await {
            warn!(error = %err, "failed to insert extracted relation");
        }
    }

    resolved
}

/// Advisory-only: whether `act` and `entropy` together suggest the episode
/// is worth surfacing in compaction-sensitive views. Not consulted by the
/// Ingestor itself (spec §4.5: entropy never gates ingestion).
#[must_use]
pub fn is_low_signal(act: DialogueAct, entropy: f32) -> bool {
    matches!(act, DialogueAct::Backchannel | DialogueAct::Greeting)
        || entropy < constants::retrieval::DENSE_SEED_FLOOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_signal_flags_backchannel() {
        assert!(is_low_signal(DialogueAct::Backchannel, 0.9));
    }

    #[test]
    fn low_signal_flags_low_entropy_statements() {
        assert!(is_low_signal(DialogueAct::Statement, 0.01));
    }

    #[test]
    fn high_entropy_statement_is_not_low_signal() {
        assert!(!is_low_signal(DialogueAct::Statement, 0.8));
    }
}

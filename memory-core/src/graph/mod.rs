//! The Graph Model (C4, spec §4.1): typed CRUD operations over the
//! Persistent Store. This module defines the [`GraphStore`] trait; concrete
//! backends (redb-backed, in-memory fakes) implement it. No other component
//! touches the store directly — the Retriever, Compressor, Resolver,
//! Invalidator, Ingestor, and Context Assembler all go through this trait.

mod config;
mod drafts;

pub use config::GraphModelConfig;
pub use drafts::{NewEntity, NewEntityRelation, NewEpisode, NewTrace};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Entity, EntityRelation, Episode, RelationType, Trace, TraceNeighbor};

/// Typed operations over the three node kinds and their edges.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // -- Episodes ---------------------------------------------------------

    /// Persist a new episode, assigning it an id and a collision-probed
    /// short id within the same logical transaction as the insert.
    async fn add_episode(&self, draft: NewEpisode) -> Result<Episode>;

    /// Look up an episode by its full id.
    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>>;

    /// Look up an episode by its short id.
    async fn get_episode_by_short_id(&self, short_id: &str) -> Result<Option<Episode>>;

    /// Most recent `n` episodes, newest first, optionally filtered by
    /// channel.
    async fn get_recent_episodes(
        &self,
        channel: Option<&str>,
        n: usize,
    ) -> Result<Vec<Episode>>;

    // -- Episode summaries --------------------------------------------------

    /// Fetch a cached summary row, if one has been produced for this
    /// `(episode_id, level)` pair.
    async fn get_episode_summary(
        &self,
        episode_id: Uuid,
        level: crate::types::SummaryLevel,
    ) -> Result<Option<crate::types::EpisodeSummary>>;

    /// Store a freshly produced summary. Overwrites are rejected: at most
    /// one row exists per `(episode_id, level)`, and content is immutable,
    /// so a caller asking to store twice almost certainly raced the
    /// single-flight coalescing in the Pyramid Compressor.
    async fn put_episode_summary(
        &self,
        summary: crate::types::EpisodeSummary,
    ) -> Result<()>;

    // -- Traces -------------------------------------------------------------

    /// Persist a new trace. `source_episode_ids` must be non-empty (spec
    /// §3 invariant: a trace has ≥ 1 source episode).
    async fn add_trace(
        &self,
        draft: NewTrace,
        source_episode_ids: &[Uuid],
    ) -> Result<Trace>;

    /// Look up a trace by id.
    async fn get_trace(&self, id: Uuid) -> Result<Option<Trace>>;

    /// Pin or unpin a trace against routine eviction.
    async fn set_trace_core(&self, id: Uuid, is_core: bool) -> Result<()>;

    /// Link `resolution_episode_id` as an additional source of `id` and
    /// boost its strength, marking an open-thread trace as resolved by a
    /// later episode.
    async fn mark_trace_done(&self, id: Uuid, resolution_episode_id: Uuid) -> Result<()>;

    /// Additively increment `strength` and bump `last_accessed` to now for
    /// every id in `ids`. Calling twice with the same delta must add twice
    /// the delta (spec §8 idempotence property).
    async fn boost_trace_access(&self, ids: &[Uuid], delta: u32) -> Result<()>;

    /// Apply exponential decay to every trace's `activation` column, with
    /// the given half-life, based on elapsed time since it was last
    /// accessed. Intended to run on a coarse external cadence, not per
    /// request.
    async fn decay_activations(&self, half_life: chrono::Duration) -> Result<()>;

    /// Source episode ids a trace was built from.
    async fn get_trace_sources(&self, id: Uuid) -> Result<Vec<Uuid>>;

    /// Entities a trace is linked to.
    async fn get_trace_entities(&self, id: Uuid) -> Result<Vec<Entity>>;

    /// Outgoing `trace-neighbor` edges from a trace.
    async fn get_trace_neighbors(&self, id: Uuid) -> Result<Vec<TraceNeighbor>>;

    /// All traces with an embedding, for the Retriever's dense seed pass.
    /// Backends may cap or stream this internally; the contract here is
    /// "every trace that currently exists".
    async fn all_traces(&self) -> Result<Vec<Trace>>;

    /// Link a trace to an entity it involves (`trace-entity` edge). Safe to
    /// call more than once for the same pair.
    async fn link_trace_to_entity(&self, trace_id: Uuid, entity_id: Uuid) -> Result<()>;

    /// Add or reinforce a `trace-neighbor` edge between two traces.
    async fn add_trace_neighbor(&self, neighbor: TraceNeighbor) -> Result<()>;

    // -- Entities -------------------------------------------------------------

    /// Persist a new entity.
    async fn add_entity(&self, draft: NewEntity) -> Result<Entity>;

    /// Look up an entity by id.
    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>>;

    /// Case-insensitive exact match against canonical entity names.
    async fn find_entity_by_canonical_name(&self, name: &str) -> Result<Option<Entity>>;

    /// Exact match against any alias of any entity.
    async fn find_entity_by_alias(&self, alias: &str) -> Result<Option<Entity>>;

    /// All entities of a given type, for embedding-similarity comparison
    /// during resolution.
    async fn find_entities_by_type(
        &self,
        entity_type: crate::types::EntityType,
    ) -> Result<Vec<Entity>>;

    /// Add `alias` to `entity_id`'s alias set. Idempotent: adding the same
    /// alias twice leaves the set unchanged (spec §8).
    async fn add_entity_alias(&self, entity_id: Uuid, alias: &str) -> Result<()>;

    /// Additively increase an entity's salience.
    async fn increment_entity_salience(&self, entity_id: Uuid, delta: f32) -> Result<()>;

    /// Word-boundary-aware scan over canonical names and aliases, ranked by
    /// salience descending (spec §4.1, §4.2 entity seed).
    async fn find_entities_by_text(&self, query: &str, max: usize) -> Result<Vec<Entity>>;

    // -- Mentions -------------------------------------------------------------

    /// Link an episode to an entity it mentions (`episode_mentions` row).
    /// Safe to call more than once for the same pair.
    async fn link_episode_to_entity(&self, episode_id: Uuid, entity_id: Uuid) -> Result<()>;

    /// Entities mentioned in an episode.
    async fn get_entities_for_episode(&self, episode_id: Uuid) -> Result<Vec<Entity>>;

    /// Episode ids that mention an entity.
    async fn get_episodes_for_entity(&self, entity_id: Uuid) -> Result<Vec<Uuid>>;

    /// Trace ids linked to an entity.
    async fn get_traces_for_entity(&self, entity_id: Uuid) -> Result<Vec<Uuid>>;

    // -- Entity relations -------------------------------------------------------------

    /// Insert a new, active relation row. Returns its id.
    async fn add_entity_relation(&self, draft: NewEntityRelation) -> Result<Uuid>;

    /// Look up a relation by id (active or invalidated).
    async fn get_entity_relation(&self, id: Uuid) -> Result<Option<EntityRelation>>;

    /// Active relations touching `entity_id` as either endpoint.
    async fn get_valid_relations_for(&self, entity_id: Uuid) -> Result<Vec<EntityRelation>>;

    /// Active relations with subject `subject` and predicate `relation_type`
    /// — the Invalidator's contradiction-candidate query (spec §4.6 step 1).
    async fn find_invalidation_candidates(
        &self,
        subject: Uuid,
        relation_type: &RelationType,
    ) -> Result<Vec<EntityRelation>>;

    /// Mark a relation invalid as of now, superseded by `invalidated_by`.
    /// `invalidated_by` must name a relation with a strictly later
    /// `valid_at` than the one being invalidated (spec §3 invariant).
    async fn invalidate_relation(&self, id: Uuid, invalidated_by: Uuid) -> Result<()>;

    /// Whether `relation_type` is in the exclusive set (spec §4.6, §9): the
    /// Invalidator consults this instead of hardcoding a list of its own.
    fn is_exclusive(&self, relation_type: &RelationType) -> bool;
}

/// Helper used by [`GraphStore::decay_activations`] implementations: the
/// multiplicative decay factor for `elapsed` against `half_life`.
#[must_use]
pub fn decay_factor(elapsed: chrono::Duration, half_life: chrono::Duration) -> f32 {
    if half_life <= chrono::Duration::zero() || elapsed <= chrono::Duration::zero() {
        return 1.0;
    }
    let ratio = elapsed.num_milliseconds() as f64 / half_life.num_milliseconds() as f64;
    2.0_f64.powf(-ratio) as f32
}

/// Now, as a small seam so tests can hold time fixed by constructing the
/// value themselves rather than calling `Utc::now()` deep in a backend.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_factor_is_one_half_at_exactly_one_half_life() {
        let hl = chrono::Duration::hours(72);
        let f = decay_factor(hl, hl);
        assert!((f - 0.5).abs() < 1e-6);
    }

    #[test]
    fn decay_factor_is_one_at_zero_elapsed() {
        let hl = chrono::Duration::hours(72);
        let f = decay_factor(chrono::Duration::zero(), hl);
        assert!((f - 1.0).abs() < 1e-6);
    }

    #[test]
    fn decay_factor_approaches_zero_for_long_elapsed() {
        let hl = chrono::Duration::hours(72);
        let f = decay_factor(chrono::Duration::hours(72 * 10), hl);
        assert!(f < 0.01);
    }
}

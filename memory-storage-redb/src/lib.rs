//! redb-backed implementation of [`memory_core::GraphStore`].
//!
//! Every table operation runs inside `spawn_blocking` under a timeout
//! (redb's transactions are synchronous); callers see a plain async trait.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use memory_core::types::{Entity, EntityRelation, EntityType, Episode, EpisodeSummary, RelationType, SummaryLevel, Trace, TraceNeighbor};
use memory_core::{Error, GraphModelConfig, GraphStore, NewEntity, NewEntityRelation, NewEpisode, NewTrace, Result};
use redb::Database;
use tracing::info;
use uuid::Uuid;

mod codec;
mod entities;
mod episodes;
mod relations;
mod tables;
mod traces;

/// Timeout for a single redb transaction run via `spawn_blocking`.
const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

async fn with_db_timeout<T, F>(operation: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(DB_OPERATION_TIMEOUT, tokio::task::spawn_blocking(operation)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::Storage(format!("task join error: {join_err}"))),
        Err(_) => Err(Error::Storage(format!(
            "database operation timed out after {DB_OPERATION_TIMEOUT:?}"
        ))),
    }
}

/// A [`GraphStore`] backed by a single redb file.
pub struct RedbStore {
    db: Arc<Database>,
    config: GraphModelConfig,
}

impl RedbStore {
    /// Open (creating if absent) a redb database at `path` with the default
    /// [`GraphModelConfig`].
    pub async fn new(path: &Path) -> Result<Self> {
        Self::new_with_config(path, GraphModelConfig::default()).await
    }

    /// Open a redb database at `path` with a caller-supplied
    /// [`GraphModelConfig`] (e.g. a different exclusive-relation-type set).
    pub async fn new_with_config(path: &Path, config: GraphModelConfig) -> Result<Self> {
        info!(path = %path.display(), "opening redb graph store");
        let path_buf = path.to_path_buf();
        let db = with_db_timeout(move || {
            Database::create(&path_buf).map_err(|e| Error::Storage(format!("create database: {e}")))
        })
        .await?;

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.initialize_tables().await?;
        info!("redb graph store ready");
        Ok(store)
    }

    async fn initialize_tables(&self) -> Result<()> {
        use tables::*;
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            write_txn.open_table(EPISODES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(EPISODE_SHORT_ID_INDEX).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(EPISODE_SUMMARIES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(TRACES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(TRACE_SHORT_ID_INDEX).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(TRACE_SOURCES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(TRACE_ENTITIES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(TRACE_NEIGHBORS_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(ENTITIES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(ENTITY_CANONICAL_INDEX).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(ENTITY_ALIAS_INDEX).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(ENTITY_ALIASES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(ENTITY_TRACES_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(ENTITY_RELATIONS_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(SUBJECT_RELATIONS_INDEX).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(EPISODE_MENTIONS_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn.open_table(ENTITY_MENTIONS_TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    /// Verify the database is still reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let db = self.db.clone();
        with_db_timeout(move || Ok(db.begin_read().is_ok())).await
    }
}

#[async_trait]
impl GraphStore for RedbStore {
    async fn add_episode(&self, draft: NewEpisode) -> Result<Episode> {
        self.add_episode_impl(draft).await
    }

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
        self.get_episode_impl(id).await
    }

    async fn get_episode_by_short_id(&self, short_id: &str) -> Result<Option<Episode>> {
        self.get_episode_by_short_id_impl(short_id).await
    }

    async fn get_recent_episodes(&self, channel: Option<&str>, n: usize) -> Result<Vec<Episode>> {
        self.get_recent_episodes_impl(channel, n).await
    }

    async fn get_episode_summary(&self, episode_id: Uuid, level: SummaryLevel) -> Result<Option<EpisodeSummary>> {
        self.get_episode_summary_impl(episode_id, level).await
    }

    async fn put_episode_summary(&self, summary: EpisodeSummary) -> Result<()> {
        self.put_episode_summary_impl(summary).await
    }

    async fn add_trace(&self, draft: NewTrace, source_episode_ids: &[Uuid]) -> Result<Trace> {
        self.add_trace_impl(draft, source_episode_ids).await
    }

    async fn get_trace(&self, id: Uuid) -> Result<Option<Trace>> {
        self.get_trace_impl(id).await
    }

    async fn set_trace_core(&self, id: Uuid, is_core: bool) -> Result<()> {
        self.set_trace_core_impl(id, is_core).await
    }

    async fn mark_trace_done(&self, id: Uuid, resolution_episode_id: Uuid) -> Result<()> {
        self.mark_trace_done_impl(id, resolution_episode_id).await
    }

    async fn boost_trace_access(&self, ids: &[Uuid], delta: u32) -> Result<()> {
        self.boost_trace_access_impl(ids, delta).await
    }

    async fn decay_activations(&self, half_life: chrono::Duration) -> Result<()> {
        self.decay_activations_impl(half_life).await
    }

    async fn get_trace_sources(&self, id: Uuid) -> Result<Vec<Uuid>> {
        self.get_trace_sources_impl(id).await
    }

    async fn get_trace_entities(&self, id: Uuid) -> Result<Vec<Entity>> {
        self.get_trace_entities_impl(id).await
    }

    async fn get_trace_neighbors(&self, id: Uuid) -> Result<Vec<TraceNeighbor>> {
        self.get_trace_neighbors_impl(id).await
    }

    async fn all_traces(&self) -> Result<Vec<Trace>> {
        self.all_traces_impl().await
    }

    async fn link_trace_to_entity(&self, trace_id: Uuid, entity_id: Uuid) -> Result<()> {
        self.link_trace_to_entity_impl(trace_id, entity_id).await
    }

    async fn add_trace_neighbor(&self, neighbor: TraceNeighbor) -> Result<()> {
        self.add_trace_neighbor_impl(neighbor).await
    }

    async fn add_entity(&self, draft: NewEntity) -> Result<Entity> {
        self.add_entity_impl(draft).await
    }

    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
        self.get_entity_impl(id).await
    }

    async fn find_entity_by_canonical_name(&self, name: &str) -> Result<Option<Entity>> {
        self.find_entity_by_canonical_name_impl(name).await
    }

    async fn find_entity_by_alias(&self, alias: &str) -> Result<Option<Entity>> {
        self.find_entity_by_alias_impl(alias).await
    }

    async fn find_entities_by_type(&self, entity_type: EntityType) -> Result<Vec<Entity>> {
        self.find_entities_by_type_impl(entity_type).await
    }

    async fn add_entity_alias(&self, entity_id: Uuid, alias: &str) -> Result<()> {
        self.add_entity_alias_impl(entity_id, alias).await
    }

    async fn increment_entity_salience(&self, entity_id: Uuid, delta: f32) -> Result<()> {
        self.increment_entity_salience_impl(entity_id, delta).await
    }

    async fn find_entities_by_text(&self, query: &str, max: usize) -> Result<Vec<Entity>> {
        self.find_entities_by_text_impl(query, max).await
    }

    async fn link_episode_to_entity(&self, episode_id: Uuid, entity_id: Uuid) -> Result<()> {
        self.link_episode_to_entity_impl(episode_id, entity_id).await
    }

    async fn get_entities_for_episode(&self, episode_id: Uuid) -> Result<Vec<Entity>> {
        self.get_entities_for_episode_impl(episode_id).await
    }

    async fn get_episodes_for_entity(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        self.get_episodes_for_entity_impl(entity_id).await
    }

    async fn get_traces_for_entity(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        self.get_traces_for_entity_impl(entity_id).await
    }

    async fn add_entity_relation(&self, draft: NewEntityRelation) -> Result<Uuid> {
        self.add_entity_relation_impl(draft).await
    }

    async fn get_entity_relation(&self, id: Uuid) -> Result<Option<EntityRelation>> {
        self.get_entity_relation_impl(id).await
    }

    async fn get_valid_relations_for(&self, entity_id: Uuid) -> Result<Vec<EntityRelation>> {
        self.get_valid_relations_for_impl(entity_id).await
    }

    async fn find_invalidation_candidates(
        &self,
        subject: Uuid,
        relation_type: &RelationType,
    ) -> Result<Vec<EntityRelation>> {
        self.find_invalidation_candidates_impl(subject, relation_type).await
    }

    async fn invalidate_relation(&self, id: Uuid, invalidated_by: Uuid) -> Result<()> {
        self.invalidate_relation_impl(id, invalidated_by).await
    }

    fn is_exclusive(&self, relation_type: &RelationType) -> bool {
        self.config.is_exclusive(relation_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::types::{DialogueAct, EntityType};

    async fn temp_store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::new(&dir.path().join("graph.redb")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn round_trips_an_episode_by_id_and_short_id() {
        let (store, _dir) = temp_store().await;
        let episode = store
            .add_episode(NewEpisode {
                content: "hello world".into(),
                source: "test".into(),
                author: "alice".into(),
                author_id: None,
                channel: Some("general".into()),
                reply_to: None,
                timestamp_event: None,
                dialogue_act: DialogueAct::Statement,
                entropy_score: 0.5,
                embedding: vec![0.1, 0.2],
                token_count: 2,
            })
            .await
            .unwrap();

        let fetched = store.get_episode(episode.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");

        let by_short = store
            .get_episode_by_short_id(&episode.short_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_short.id, episode.id);
    }

    #[tokio::test]
    async fn recent_episodes_filters_by_channel_and_sorts_newest_first() {
        let (store, _dir) = temp_store().await;
        for (content, channel) in [("a", "general"), ("b", "random"), ("c", "general")] {
            store
                .add_episode(NewEpisode {
                    content: content.into(),
                    source: "test".into(),
                    author: "alice".into(),
                    author_id: None,
                    channel: Some(channel.into()),
                    reply_to: None,
                    timestamp_event: None,
                    dialogue_act: DialogueAct::Statement,
                    entropy_score: 0.5,
                    embedding: vec![],
                    token_count: 1,
                })
                .await
                .unwrap();
        }

        let recent = store.get_recent_episodes(Some("general"), 10).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn entity_resolution_indexes_round_trip() {
        let (store, _dir) = temp_store().await;
        let entity = store
            .add_entity(NewEntity {
                name: "Sarah Chen".into(),
                entity_type: EntityType::Person,
                salience: 1.0,
                embedding: vec![0.1; 4],
            })
            .await
            .unwrap();

        let by_name = store.find_entity_by_canonical_name("sarah chen").await.unwrap();
        assert_eq!(by_name.unwrap().id, entity.id);

        store.add_entity_alias(entity.id, "Dr. Chen").await.unwrap();
        let by_alias = store.find_entity_by_alias("dr. chen").await.unwrap();
        assert_eq!(by_alias.unwrap().id, entity.id);
    }

    #[tokio::test]
    async fn exclusive_relation_config_round_trips_through_is_exclusive() {
        let (store, _dir) = temp_store().await;
        assert!(store.is_exclusive(&RelationType::from("LOCATED_IN")));
        assert!(!store.is_exclusive(&RelationType::from("LIKES")));
    }

    #[tokio::test]
    async fn invalidation_candidates_only_return_active_relations_for_the_subject_predicate_pair() {
        let (store, _dir) = temp_store().await;
        let alice = store
            .add_entity(NewEntity {
                name: "Alice".into(),
                entity_type: EntityType::Person,
                salience: 1.0,
                embedding: vec![],
            })
            .await
            .unwrap();
        let berlin = store
            .add_entity(NewEntity {
                name: "Berlin".into(),
                entity_type: EntityType::Gpe,
                salience: 1.0,
                embedding: vec![],
            })
            .await
            .unwrap();
        let episode = store
            .add_episode(NewEpisode {
                content: "Alice lives in Berlin".into(),
                source: "test".into(),
                author: "alice".into(),
                author_id: None,
                channel: None,
                reply_to: None,
                timestamp_event: None,
                dialogue_act: DialogueAct::Statement,
                entropy_score: 0.5,
                embedding: vec![],
                token_count: 4,
            })
            .await
            .unwrap();

        let relation_id = store
            .add_entity_relation(NewEntityRelation {
                from_id: alice.id,
                to_id: berlin.id,
                relation_type: RelationType::from("LOCATED_IN"),
                weight: 1.0,
                valid_at: memory_core::graph::now(),
                source_episode_id: episode.id,
            })
            .await
            .unwrap();

        let candidates = store
            .find_invalidation_candidates(alice.id, &RelationType::from("LOCATED_IN"))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, relation_id);

        store.invalidate_relation(relation_id, Uuid::new_v4()).await.unwrap();
        let candidates = store
            .find_invalidation_candidates(alice.id, &RelationType::from("LOCATED_IN"))
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }
}

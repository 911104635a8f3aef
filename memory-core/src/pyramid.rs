//! Pyramid Compressor (C5, spec §4.3).
//!
//! Produces and caches multi-level summaries of episodes. Generation is lazy
//! (first demand) and concurrent calls for the same `(episode_id, level)`
//! coalesce: at most one generation call is in flight per fingerprint, late
//! callers await the winner (spec §5 "Pyramid summary coalescing").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::types::{Episode, EpisodeSummary, SummaryLevel};

type Fingerprint = (Uuid, SummaryLevel);

/// Owns the in-flight coalescing map. Stateless otherwise: the cache itself
/// lives in the store, never in this struct, per spec §9's guidance against
/// process-local state that can desync from durable rows.
#[derive(Default)]
pub struct PyramidCompressor {
    inflight: SyncMutex<HashMap<Fingerprint, Arc<AsyncMutex<()>>>>,
}

impl PyramidCompressor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached summary for `(episode.id, level)`, generating and
    /// caching it first if absent. On generation failure, returns the error
    /// and caches nothing.
    pub async fn get_summary(
        &self,
        store: &dyn GraphStore,
        embeddings: &dyn EmbeddingProvider,
        episode: &Episode,
        level: SummaryLevel,
    ) -> Result<EpisodeSummary> {
        if let Some(existing) = store.get_episode_summary(episode.id, level).await? {
            return Ok(existing);
        }

        let key = (episode.id, level);
        let lock = {
            let mut map = self.inflight.lock();
            map.entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let _guard = lock.lock().await;

        // Double-checked: the winner of the race already stored a result.
        if let Some(existing) = store.get_episode_summary(episode.id, level).await? {
            self.release(key, &lock);
            return Ok(existing);
        }

        let generated = self.generate(embeddings, episode, level).await;
        self.release(key, &lock);

        match generated {
            Ok(summary) => {
                store.put_episode_summary(summary.clone()).await?;
                Ok(summary)
            }
            Err(err) => Err(err),
        }
    }

    async fn generate(
        &self,
        embeddings: &dyn EmbeddingProvider,
        episode: &Episode,
        level: SummaryLevel,
    ) -> Result<EpisodeSummary> {
        let target_words = level.target_words();
        let prompt = format!(
            "Summarize the following message in about {target_words} words, \
             preserving concrete names, places, and facts:\n\n{}",
            episode.content
        );
        let summary = embeddings.generate(&prompt).await?;
        let token_count = summary.split_whitespace().count() as u32;

        Ok(EpisodeSummary {
            episode_id: episode.id,
            level,
            summary,
            token_count,
            embedding: None,
        })
    }

    /// Drop the in-flight entry once no other waiter still holds a clone of
    /// it (the map's own reference plus this caller's local `lock` account
    /// for the base count of 2).
    fn release(&self, key: Fingerprint, lock: &Arc<AsyncMutex<()>>) {
        let mut map = self.inflight.lock();
        if let Some(entry) = map.get(&key) {
            if Arc::ptr_eq(entry, lock) && Arc::strong_count(entry) <= 2 {
                map.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbeddings {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok("a short summary".to_string())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn sample_episode() -> Episode {
        Episode {
            id: Uuid::new_v4(),
            short_id: "abcde".into(),
            content: "My favorite coffee shop is Blue Bottle on Market Street".into(),
            source: "test".into(),
            author: "u1".into(),
            author_id: None,
            channel: None,
            reply_to: None,
            timestamp_event: Utc::now(),
            timestamp_ingested: Utc::now(),
            dialogue_act: crate::types::DialogueAct::Statement,
            entropy_score: 0.7,
            embedding: vec![0.0; 4],
            token_count: 10,
        }
    }

    #[tokio::test]
    async fn concurrent_requests_for_the_same_fingerprint_coalesce() {
        let store = test_store::InMemoryStore::new();
        let embeddings = Arc::new(CountingEmbeddings {
            calls: AtomicUsize::new(0),
        });
        let compressor = Arc::new(PyramidCompressor::new());
        let episode = Arc::new(sample_episode());
        store.insert_episode_for_test(episode.as_ref().clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let compressor = compressor.clone();
            let embeddings = embeddings.clone();
            let episode = episode.clone();
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                compressor
                    .get_summary(&store, embeddings.as_ref(), &episode, SummaryLevel::Short)
                    .await
                    .unwrap()
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(embeddings.calls.load(Ordering::SeqCst), 1);
    }

    mod test_store {
        //! Minimal in-process store used only by this module's coalescing
        //! test; the full in-memory fixture lives in the `test-utils` crate.
        use super::*;
        use crate::graph::{GraphModelConfig, NewEntity, NewEntityRelation, NewEpisode, NewTrace};
        use crate::types::{Entity, EntityRelation, RelationType, Trace, TraceNeighbor};
        use async_trait::async_trait;
        use std::sync::Mutex;

        #[derive(Clone, Default)]
        pub struct InMemoryStore {
            episodes: Arc<Mutex<HashMap<Uuid, Episode>>>,
            summaries: Arc<Mutex<HashMap<Fingerprint, EpisodeSummary>>>,
        }

        impl InMemoryStore {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn insert_episode_for_test(&self, episode: Episode) {
                self.episodes.lock().unwrap().insert(episode.id, episode);
            }
        }

        #[async_trait]
        impl GraphStore for InMemoryStore {
            async fn add_episode(&self, _draft: NewEpisode) -> Result<Episode> {
                unimplemented!("not exercised by this test")
            }
            async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
                Ok(self.episodes.lock().unwrap().get(&id).cloned())
            }
            async fn get_episode_by_short_id(&self, _short_id: &str) -> Result<Option<Episode>> {
                unimplemented!()
            }
            async fn get_recent_episodes(
                &self,
                _channel: Option<&str>,
                _n: usize,
            ) -> Result<Vec<Episode>> {
                unimplemented!()
            }
            async fn get_episode_summary(
                &self,
                episode_id: Uuid,
                level: SummaryLevel,
            ) -> Result<Option<EpisodeSummary>> {
                Ok(self
                    .summaries
                    .lock()
                    .unwrap()
                    .get(&(episode_id, level))
                    .cloned())
            }
            async fn put_episode_summary(&self, summary: EpisodeSummary) -> Result<()> {
                self.summaries
                    .lock()
                    .unwrap()
                    .insert((summary.episode_id, summary.level), summary);
                Ok(())
            }
            async fn add_trace(&self, _draft: NewTrace, _sources: &[Uuid]) -> Result<Trace> {
                unimplemented!()
            }
            async fn get_trace(&self, _id: Uuid) -> Result<Option<Trace>> {
                unimplemented!()
            }
            async fn set_trace_core(&self, _id: Uuid, _is_core: bool) -> Result<()> {
                unimplemented!()
            }
            async fn mark_trace_done(&self, _id: Uuid, _resolution_episode_id: Uuid) -> Result<()> {
                unimplemented!()
            }
            async fn boost_trace_access(&self, _ids: &[Uuid], _delta: u32) -> Result<()> {
                unimplemented!()
            }
            async fn decay_activations(&self, _half_life: chrono::Duration) -> Result<()> {
                unimplemented!()
            }
            async fn get_trace_sources(&self, _id: Uuid) -> Result<Vec<Uuid>> {
                unimplemented!()
            }
            async fn get_trace_entities(&self, _id: Uuid) -> Result<Vec<Entity>> {
                unimplemented!()
            }
            async fn get_trace_neighbors(&self, _id: Uuid) -> Result<Vec<TraceNeighbor>> {
                unimplemented!()
            }
            async fn all_traces(&self) -> Result<Vec<Trace>> {
                unimplemented!()
            }
            async fn link_trace_to_entity(&self, _trace_id: Uuid, _entity_id: Uuid) -> Result<()> {
                unimplemented!()
            }
            async fn add_trace_neighbor(&self, _neighbor: TraceNeighbor) -> Result<()> {
                unimplemented!()
            }
            async fn add_entity(&self, _draft: NewEntity) -> Result<Entity> {
                unimplemented!()
            }
            async fn get_entity(&self, _id: Uuid) -> Result<Option<Entity>> {
                unimplemented!()
            }
            async fn find_entity_by_canonical_name(&self, _name: &str) -> Result<Option<Entity>> {
                unimplemented!()
            }
            async fn find_entity_by_alias(&self, _alias: &str) -> Result<Option<Entity>> {
                unimplemented!()
            }
            async fn find_entities_by_type(
                &self,
                _entity_type: crate::types::EntityType,
            ) -> Result<Vec<Entity>> {
                unimplemented!()
            }
            async fn add_entity_alias(&self, _entity_id: Uuid, _alias: &str) -> Result<()> {
                unimplemented!()
            }
            async fn increment_entity_salience(&self, _entity_id: Uuid, _delta: f32) -> Result<()> {
                unimplemented!()
            }
            async fn find_entities_by_text(&self, _query: &str, _max: usize) -> Result<Vec<Entity>> {
                unimplemented!()
            }
            async fn link_episode_to_entity(&self, _episode_id: Uuid, _entity_id: Uuid) -> Result<()> {
                unimplemented!()
            }
            async fn get_entities_for_episode(&self, _episode_id: Uuid) -> Result<Vec<Entity>> {
                unimplemented!()
            }
            async fn get_episodes_for_entity(&self, _entity_id: Uuid) -> Result<Vec<Uuid>> {
                unimplemented!()
            }
            async fn get_traces_for_entity(&self, _entity_id: Uuid) -> Result<Vec<Uuid>> {
                unimplemented!()
            }
            async fn add_entity_relation(&self, _draft: NewEntityRelation) -> Result<Uuid> {
                unimplemented!()
            }
            async fn get_entity_relation(&self, _id: Uuid) -> Result<Option<EntityRelation>> {
                unimplemented!()
            }
            async fn get_valid_relations_for(&self, _entity_id: Uuid) -> Result<Vec<EntityRelation>> {
                unimplemented!()
            }
            async fn find_invalidation_candidates(
                &self,
                _subject: Uuid,
                _relation_type: &RelationType,
            ) -> Result<Vec<EntityRelation>> {
                unimplemented!()
            }
            async fn invalidate_relation(&self, _id: Uuid, _invalidated_by: Uuid) -> Result<()> {
                unimplemented!()
            }
            fn is_exclusive(&self, relation_type: &RelationType) -> bool {
                GraphModelConfig::default().is_exclusive(relation_type)
            }
        }
    }
}

//! A full, in-process [`GraphStore`] over plain `HashMap`s. Used by
//! `memory-core`'s own tests and by every storage backend's test suite as
//! the reference implementation to compare against.

use std::collections::HashMap;

use async_trait::async_trait;
use memory_core::graph::now;
use memory_core::types::{
    Entity, EntityRelation, EntityType, Episode, EpisodeSummary, RelationType, SummaryLevel, Trace,
    TraceNeighbor,
};
use memory_core::{Error, GraphModelConfig, GraphStore, NewEntity, NewEntityRelation, NewEpisode, NewTrace, Result};
use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    episodes: HashMap<Uuid, Episode>,
    episode_short_ids: HashMap<String, Uuid>,
    summaries: HashMap<(Uuid, SummaryLevel), EpisodeSummary>,

    traces: HashMap<Uuid, Trace>,
    trace_short_ids: HashMap<String, Uuid>,
    trace_sources: HashMap<Uuid, Vec<Uuid>>,
    trace_entities: HashMap<Uuid, Vec<Uuid>>,
    entity_traces: HashMap<Uuid, Vec<Uuid>>,
    trace_neighbors: HashMap<Uuid, Vec<TraceNeighbor>>,

    entities: HashMap<Uuid, Entity>,
    canonical_index: HashMap<String, Uuid>,
    alias_index: HashMap<String, Uuid>,
    aliases: HashMap<Uuid, Vec<String>>,

    relations: HashMap<Uuid, EntityRelation>,
    subject_relations_index: HashMap<(Uuid, RelationType), Vec<Uuid>>,

    episode_mentions: HashMap<Uuid, Vec<Uuid>>,
    entity_mentions: HashMap<Uuid, Vec<Uuid>>,
}

/// An in-memory [`GraphStore`]. Cheap to construct; one per test.
pub struct InMemoryStore {
    state: RwLock<State>,
    config: GraphModelConfig,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            config: GraphModelConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(config: GraphModelConfig) -> Self {
        Self {
            state: RwLock::new(State::default()),
            config,
        }
    }

    fn unique_short_id(existing: &HashMap<String, Uuid>, id: Uuid) -> Result<String> {
        memory_core::short_id::generate_unique(id, |candidate| Ok(existing.contains_key(candidate)))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn add_episode(&self, draft: NewEpisode) -> Result<Episode> {
        let mut state = self.state.write();
        let id = Uuid::new_v4();
        let short_id = Self::unique_short_id(&state.episode_short_ids, id)?;
        let now = now();
        let episode = Episode {
            id,
            short_id: short_id.clone(),
            content: draft.content,
            source: draft.source,
            author: draft.author,
            author_id: draft.author_id,
            channel: draft.channel,
            reply_to: draft.reply_to,
            timestamp_event: draft.timestamp_event.unwrap_or(now),
            timestamp_ingested: now,
            dialogue_act: draft.dialogue_act,
            entropy_score: draft.entropy_score,
            embedding: draft.embedding,
            token_count: draft.token_count,
        };
        state.episode_short_ids.insert(short_id, id);
        state.episodes.insert(id, episode.clone());
        Ok(episode)
    }

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
        Ok(self.state.read().episodes.get(&id).cloned())
    }

    async fn get_episode_by_short_id(&self, short_id: &str) -> Result<Option<Episode>> {
        let state = self.state.read();
        Ok(state
            .episode_short_ids
            .get(short_id)
            .and_then(|id| state.episodes.get(id))
            .cloned())
    }

    async fn get_recent_episodes(&self, channel: Option<&str>, n: usize) -> Result<Vec<Episode>> {
        let state = self.state.read();
        let mut episodes: Vec<Episode> = state
            .episodes
            .values()
            .filter(|e| channel.is_none_or(|c| e.channel.as_deref() == Some(c)))
            .cloned()
            .collect();
        episodes.sort_by(|a, b| b.timestamp_event.cmp(&a.timestamp_event));
        episodes.truncate(n);
        Ok(episodes)
    }

    async fn get_episode_summary(&self, episode_id: Uuid, level: SummaryLevel) -> Result<Option<EpisodeSummary>> {
        Ok(self.state.read().summaries.get(&(episode_id, level)).cloned())
    }

    async fn put_episode_summary(&self, summary: EpisodeSummary) -> Result<()> {
        let key = (summary.episode_id, summary.level);
        self.state.write().summaries.insert(key, summary);
        Ok(())
    }

    async fn add_trace(&self, draft: NewTrace, source_episode_ids: &[Uuid]) -> Result<Trace> {
        if source_episode_ids.is_empty() {
            return Err(Error::InvalidInput(
                "a trace must have at least one source episode".into(),
            ));
        }
        let mut state = self.state.write();
        let id = Uuid::new_v4();
        let short_id = Self::unique_short_id(&state.trace_short_ids, id)?;
        let now = now();
        let trace = Trace {
            id,
            short_id: short_id.clone(),
            summary: draft.summary,
            topic: draft.topic,
            trace_type: draft.trace_type,
            embedding: draft.embedding,
            strength: 0,
            activation: 1.0,
            is_core: draft.is_core,
            created_at: now,
            last_accessed: now,
        };
        state.trace_short_ids.insert(short_id, id);
        state.trace_sources.insert(id, source_episode_ids.to_vec());
        state.traces.insert(id, trace.clone());
        Ok(trace)
    }

    async fn get_trace(&self, id: Uuid) -> Result<Option<Trace>> {
        Ok(self.state.read().traces.get(&id).cloned())
    }

    async fn set_trace_core(&self, id: Uuid, is_core: bool) -> Result<()> {
        let mut state = self.state.write();
        let trace = state.traces.get_mut(&id).ok_or_else(|| Error::NotFound(format!("trace {id}")))?;
        trace.is_core = is_core;
        Ok(())
    }

    async fn mark_trace_done(&self, id: Uuid, resolution_episode_id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        {
            let trace = state.traces.get_mut(&id).ok_or_else(|| Error::NotFound(format!("trace {id}")))?;
            trace.strength += 1;
            trace.last_accessed = now();
        }
        let sources = state.trace_sources.entry(id).or_default();
        if !sources.contains(&resolution_episode_id) {
            sources.push(resolution_episode_id);
        }
        Ok(())
    }

    async fn boost_trace_access(&self, ids: &[Uuid], delta: u32) -> Result<()> {
        let mut state = self.state.write();
        let now = now();
        for id in ids {
            if let Some(trace) = state.traces.get_mut(id) {
                trace.strength += delta;
                trace.last_accessed = now;
            }
        }
        Ok(())
    }

    async fn decay_activations(&self, half_life: chrono::Duration) -> Result<()> {
        let mut state = self.state.write();
        let now = now();
        for trace in state.traces.values_mut() {
            let elapsed = now - trace.last_accessed;
            trace.activation *= memory_core::graph::decay_factor(elapsed, half_life);
        }
        Ok(())
    }

    async fn get_trace_sources(&self, id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.state.read().trace_sources.get(&id).cloned().unwrap_or_default())
    }

    async fn get_trace_entities(&self, id: Uuid) -> Result<Vec<Entity>> {
        let state = self.state.read();
        Ok(state
            .trace_entities
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|eid| state.entities.get(eid).cloned())
            .collect())
    }

    async fn get_trace_neighbors(&self, id: Uuid) -> Result<Vec<TraceNeighbor>> {
        Ok(self.state.read().trace_neighbors.get(&id).cloned().unwrap_or_default())
    }

    async fn all_traces(&self) -> Result<Vec<Trace>> {
        Ok(self.state.read().traces.values().cloned().collect())
    }

    async fn link_trace_to_entity(&self, trace_id: Uuid, entity_id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        let trace_list = state.trace_entities.entry(trace_id).or_default();
        if !trace_list.contains(&entity_id) {
            trace_list.push(entity_id);
        }
        let entity_list = state.entity_traces.entry(entity_id).or_default();
        if !entity_list.contains(&trace_id) {
            entity_list.push(trace_id);
        }
        Ok(())
    }

    async fn add_trace_neighbor(&self, neighbor: TraceNeighbor) -> Result<()> {
        let mut state = self.state.write();
        let edges = state.trace_neighbors.entry(neighbor.from).or_default();
        if let Some(existing) = edges.iter_mut().find(|e| e.to == neighbor.to && e.edge_type == neighbor.edge_type) {
            existing.weight = neighbor.weight;
        } else {
            edges.push(neighbor);
        }
        Ok(())
    }

    async fn add_entity(&self, draft: NewEntity) -> Result<Entity> {
        let mut state = self.state.write();
        let id = Uuid::new_v4();
        let now = now();
        let entity = Entity {
            id,
            name: draft.name,
            entity_type: draft.entity_type,
            salience: draft.salience,
            embedding: draft.embedding,
            created_at: now,
            updated_at: now,
        };
        state.canonical_index.insert(entity.name.to_lowercase(), id);
        state.entities.insert(id, entity.clone());
        Ok(entity)
    }

    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
        Ok(self.state.read().entities.get(&id).cloned())
    }

    async fn find_entity_by_canonical_name(&self, name: &str) -> Result<Option<Entity>> {
        let state = self.state.read();
        Ok(state
            .canonical_index
            .get(&name.to_lowercase())
            .and_then(|id| state.entities.get(id))
            .cloned())
    }

    async fn find_entity_by_alias(&self, alias: &str) -> Result<Option<Entity>> {
        let state = self.state.read();
        Ok(state
            .alias_index
            .get(&alias.to_lowercase())
            .and_then(|id| state.entities.get(id))
            .cloned())
    }

    async fn find_entities_by_type(&self, entity_type: EntityType) -> Result<Vec<Entity>> {
        Ok(self
            .state
            .read()
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn add_entity_alias(&self, entity_id: Uuid, alias: &str) -> Result<()> {
        let mut state = self.state.write();
        let list = state.aliases.entry(entity_id).or_default();
        if !list.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
            list.push(alias.to_string());
            state.alias_index.insert(alias.to_lowercase(), entity_id);
        }
        Ok(())
    }

    async fn increment_entity_salience(&self, entity_id: Uuid, delta: f32) -> Result<()> {
        let mut state = self.state.write();
        let entity = state
            .entities
            .get_mut(&entity_id)
            .ok_or_else(|| Error::NotFound(format!("entity {entity_id}")))?;
        entity.salience += delta;
        entity.updated_at = now();
        Ok(())
    }

    async fn find_entities_by_text(&self, query: &str, max: usize) -> Result<Vec<Entity>> {
        let query = query.to_lowercase();
        let state = self.state.read();
        let mut matches: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| {
                contains_word(&e.name.to_lowercase(), &query)
                    || state
                        .aliases
                        .get(&e.id)
                        .is_some_and(|list| list.iter().any(|a| contains_word(&a.to_lowercase(), &query)))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.salience.partial_cmp(&a.salience).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(max);
        Ok(matches)
    }

    async fn link_episode_to_entity(&self, episode_id: Uuid, entity_id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        let mentions = state.episode_mentions.entry(episode_id).or_default();
        if !mentions.contains(&entity_id) {
            mentions.push(entity_id);
        }
        let reverse = state.entity_mentions.entry(entity_id).or_default();
        if !reverse.contains(&episode_id) {
            reverse.push(episode_id);
        }
        Ok(())
    }

    async fn get_entities_for_episode(&self, episode_id: Uuid) -> Result<Vec<Entity>> {
        let state = self.state.read();
        Ok(state
            .episode_mentions
            .get(&episode_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.entities.get(id).cloned())
            .collect())
    }

    async fn get_episodes_for_entity(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.state.read().entity_mentions.get(&entity_id).cloned().unwrap_or_default())
    }

    async fn get_traces_for_entity(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.state.read().entity_traces.get(&entity_id).cloned().unwrap_or_default())
    }

    async fn add_entity_relation(&self, draft: NewEntityRelation) -> Result<Uuid> {
        let mut state = self.state.write();
        let id = Uuid::new_v4();
        let relation = EntityRelation {
            id,
            from_id: draft.from_id,
            to_id: draft.to_id,
            relation_type: draft.relation_type.clone(),
            weight: draft.weight,
            valid_at: draft.valid_at,
            invalid_at: None,
            invalidated_by: None,
            source_episode_id: draft.source_episode_id,
            created_at: now(),
        };
        state
            .subject_relations_index
            .entry((draft.from_id, draft.relation_type))
            .or_default()
            .push(id);
        state.relations.insert(id, relation);
        Ok(id)
    }

    async fn get_entity_relation(&self, id: Uuid) -> Result<Option<EntityRelation>> {
        Ok(self.state.read().relations.get(&id).cloned())
    }

    async fn get_valid_relations_for(&self, entity_id: Uuid) -> Result<Vec<EntityRelation>> {
        Ok(self
            .state
            .read()
            .relations
            .values()
            .filter(|r| r.is_active() && (r.from_id == entity_id || r.to_id == entity_id))
            .cloned()
            .collect())
    }

    async fn find_invalidation_candidates(&self, subject: Uuid, relation_type: &RelationType) -> Result<Vec<EntityRelation>> {
        let state = self.state.read();
        Ok(state
            .subject_relations_index
            .get(&(subject, relation_type.clone()))
            .into_iter()
            .flatten()
            .filter_map(|id| state.relations.get(id))
            .filter(|r| r.is_active())
            .cloned()
            .collect())
    }

    async fn invalidate_relation(&self, id: Uuid, invalidated_by: Uuid) -> Result<()> {
        let mut state = self.state.write();
        let relation = state
            .relations
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("entity relation {id}")))?;
        relation.invalid_at = Some(now());
        relation.invalidated_by = Some(invalidated_by);
        Ok(())
    }

    fn is_exclusive(&self, relation_type: &RelationType) -> bool {
        self.config.is_exclusive(relation_type)
    }
}

fn contains_word(needle: &str, haystack: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|word| word == needle) || haystack.contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeEmbeddingProvider;
    use memory_core::invalidator::Invalidator;
    use memory_core::resolver::resolve;
    use memory_core::types::{DialogueAct, EntityType, ExtractedEntity, MatchedBy, RelationType};
    use memory_core::NewEntityRelation;

    fn located_in_relation(from_id: Uuid, to_id: Uuid) -> NewEntityRelation {
        NewEntityRelation {
            from_id,
            to_id,
            relation_type: RelationType::from("LOCATED_IN"),
            weight: 1.0,
            valid_at: now(),
            source_episode_id: Uuid::new_v4(),
        }
    }

    fn sample_episode() -> NewEpisode {
        NewEpisode {
            content: "hello".into(),
            source: "test".into(),
            author: "alice".into(),
            author_id: None,
            channel: None,
            reply_to: None,
            timestamp_event: None,
            dialogue_act: DialogueAct::Statement,
            entropy_score: 0.5,
            embedding: vec![0.1, 0.2],
            token_count: 1,
        }
    }

    #[tokio::test]
    async fn add_and_get_episode_round_trips() {
        let store = InMemoryStore::new();
        let episode = store.add_episode(sample_episode()).await.unwrap();
        let fetched = store.get_episode(episode.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
    }

    #[tokio::test]
    async fn reply_to_a_nonexistent_episode_is_not_checked_by_the_store_itself() {
        let store = InMemoryStore::new();
        let mut draft = sample_episode();
        draft.reply_to = Some(Uuid::new_v4());
        let episode = store.add_episode(draft).await.unwrap();
        assert!(episode.reply_to.is_some());
    }

    #[tokio::test]
    async fn add_trace_rejects_empty_source_list() {
        let store = InMemoryStore::new();
        let draft = NewTrace {
            summary: "s".into(),
            topic: "t".into(),
            trace_type: memory_core::types::TraceType::Episodic,
            embedding: vec![],
            is_core: false,
        };
        let err = store.add_trace(draft, &[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn boost_trace_access_is_additive_across_calls() {
        let store = InMemoryStore::new();
        let episode = store.add_episode(sample_episode()).await.unwrap();
        let trace = store
            .add_trace(
                NewTrace {
                    summary: "s".into(),
                    topic: "t".into(),
                    trace_type: memory_core::types::TraceType::Episodic,
                    embedding: vec![],
                    is_core: false,
                },
                &[episode.id],
            )
            .await
            .unwrap();

        store.boost_trace_access(&[trace.id], 2).await.unwrap();
        store.boost_trace_access(&[trace.id], 3).await.unwrap();
        let fetched = store.get_trace(trace.id).await.unwrap().unwrap();
        assert_eq!(fetched.strength, 5);
    }

    #[tokio::test]
    async fn contradiction_invalidates_the_prior_relation_and_leaves_only_the_new_one_active() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new().with_response(r#"{"invalidated_ids": []}"#);
        let invalidator = Invalidator::new();

        let alex = store
            .add_entity(NewEntity {
                name: "Alex".into(),
                entity_type: EntityType::Person,
                salience: 1.0,
                embedding: vec![0.1, 0.2],
            })
            .await
            .unwrap();
        let seattle = store
            .add_entity(NewEntity {
                name: "Seattle".into(),
                entity_type: EntityType::Gpe,
                salience: 1.0,
                embedding: vec![0.3, 0.4],
            })
            .await
            .unwrap();

        // Day 1: "Alex lives in Seattle" -> R1 active, no prior candidates.
        let r1 = invalidator
            .insert_with_invalidation(&store, &embeddings, located_in_relation(alex.id, seattle.id))
            .await
            .unwrap();

        let portland = store
            .add_entity(NewEntity {
                name: "Portland".into(),
                entity_type: EntityType::Gpe,
                salience: 1.0,
                embedding: vec![0.5, 0.6],
            })
            .await
            .unwrap();

        // Day 2: "Alex moved to Portland" -> the model says R1 is contradicted.
        let embeddings = FakeEmbeddingProvider::new().with_response(format!(
            r#"{{"invalidated_ids": ["{r1}"], "reason": "Alex can't live in two places"}}"#
        ));
        let r2 = invalidator
            .insert_with_invalidation(&store, &embeddings, located_in_relation(alex.id, portland.id))
            .await
            .unwrap();

        let valid = store.get_valid_relations_for(alex.id).await.unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].id, r2);
        assert_eq!(valid[0].to_id, portland.id);

        let r1_relation = store.get_entity_relation(r1).await.unwrap().unwrap();
        assert!(!r1_relation.is_active());
        assert_eq!(r1_relation.invalidated_by, Some(r2));
    }

    #[tokio::test]
    async fn non_exclusive_relations_coexist_without_invalidation() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new();
        let invalidator = Invalidator::new();

        let alex = store
            .add_entity(NewEntity {
                name: "Alex".into(),
                entity_type: EntityType::Person,
                salience: 1.0,
                embedding: vec![0.1, 0.2],
            })
            .await
            .unwrap();
        let python = store
            .add_entity(NewEntity {
                name: "Python".into(),
                entity_type: EntityType::Product,
                salience: 1.0,
                embedding: vec![0.3, 0.4],
            })
            .await
            .unwrap();
        let go = store
            .add_entity(NewEntity {
                name: "Go".into(),
                entity_type: EntityType::Product,
                salience: 1.0,
                embedding: vec![0.5, 0.6],
            })
            .await
            .unwrap();

        let knows = |from_id: Uuid, to_id: Uuid| NewEntityRelation {
            from_id,
            to_id,
            relation_type: RelationType::from("KNOWS"),
            weight: 1.0,
            valid_at: now(),
            source_episode_id: Uuid::new_v4(),
        };

        // "Alex knows Python" then "Alex knows Go": KNOWS is not exclusive,
        // so the invalidator never even calls the model.
        invalidator
            .insert_with_invalidation(&store, &embeddings, knows(alex.id, python.id))
            .await
            .unwrap();
        invalidator
            .insert_with_invalidation(&store, &embeddings, knows(alex.id, go.id))
            .await
            .unwrap();

        let valid = store.get_valid_relations_for(alex.id).await.unwrap();
        assert_eq!(valid.len(), 2);
        assert!(valid.iter().all(EntityRelation::is_active));
    }

    #[tokio::test]
    async fn resolve_cascade_matches_canonical_then_alias_then_embedding_then_creates_new() {
        let store = InMemoryStore::new();
        let embeddings = FakeEmbeddingProvider::new();

        let mention = ExtractedEntity {
            name: "Alex".into(),
            entity_type: EntityType::Person,
            confidence: 0.9,
            span: None,
        };

        // First sighting: no canonical, no alias, no embedding match close
        // enough -> creates a new entity.
        let outcome = resolve(&store, &embeddings, &mention).await.unwrap();
        assert!(outcome.is_new);
        assert_eq!(outcome.matched_by, MatchedBy::New);
        let alex_id = outcome.entity.id;

        // Exact same name resolves to the same entity via the canonical path.
        let outcome = resolve(&store, &embeddings, &mention).await.unwrap();
        assert!(!outcome.is_new);
        assert_eq!(outcome.matched_by, MatchedBy::Canonical);
        assert_eq!(outcome.entity.id, alex_id);

        // A known alias resolves to the same entity without creating a new one.
        store.add_entity_alias(alex_id, "Al").await.unwrap();
        let alias_mention = ExtractedEntity {
            name: "Al".into(),
            entity_type: EntityType::Person,
            confidence: 0.9,
            span: None,
        };
        let outcome = resolve(&store, &embeddings, &alias_mention).await.unwrap();
        assert!(!outcome.is_new);
        assert_eq!(outcome.matched_by, MatchedBy::Alias);
        assert_eq!(outcome.entity.id, alex_id);

        // An unrelated name of the same type with no canonical/alias/embedding
        // match creates a distinct entity.
        let other_mention = ExtractedEntity {
            name: "Zzyzx Corp".into(),
            entity_type: EntityType::Person,
            confidence: 0.9,
            span: None,
        };
        let outcome = resolve(&store, &embeddings, &other_mention).await.unwrap();
        assert!(outcome.is_new);
        assert_ne!(outcome.entity.id, alex_id);
    }
}

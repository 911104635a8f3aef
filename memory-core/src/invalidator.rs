//! Invalidator (C7, spec §4.6).
//!
//! Invoked whenever a new entity relation is asserted. If its predicate is
//! an exclusive relation type, existing active relations with the same
//! subject and predicate are reviewed by the generation model for
//! contradiction and superseded if so. Fails open: if the model call fails
//! or its response cannot be parsed, the new relation is still inserted and
//! no candidate is touched.
//!
//! The query→LLM→write sequence for a given `(subject, relation_type)` key
//! runs under a per-key async mutex (spec §5: the Invalidator holds a lock
//! on this key across the whole sequence), the same keyed-mutex shape
//! `PyramidCompressor` uses for its per-fingerprint coalescing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::graph::{GraphStore, NewEntityRelation};
use crate::types::{EntityRelation, RelationType};

type Key = (Uuid, RelationType);

#[derive(Debug, Deserialize)]
struct InvalidationVerdict {
    invalidated_ids: Vec<uuid::Uuid>,
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

/// Owns the per-`(subject, relation_type)` lock map. Stateless otherwise,
/// mirroring [`crate::pyramid::PyramidCompressor`].
#[derive(Default)]
pub struct Invalidator {
    locks: SyncMutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl Invalidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `draft` as a new entity relation, running contradiction review
    /// against existing active relations first if its predicate is
    /// exclusive. Returns the new relation's id.
    pub async fn insert_with_invalidation(
        &self,
        store: &dyn GraphStore,
        embeddings: &dyn EmbeddingProvider,
        draft: NewEntityRelation,
    ) -> Result<uuid::Uuid> {
        if !store.is_exclusive(&draft.relation_type) {
            return store.add_entity_relation(draft).await;
        }

        let key = (draft.from_id, draft.relation_type.clone());
        let lock = {
            let mut map = self.locks.lock();
            map.entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        let result = self.insert_with_invalidation_locked(store, embeddings, draft).await;
        self.release(key, &lock);
        result
    }

    async fn insert_with_invalidation_locked(
        &self,
        store: &dyn GraphStore,
        embeddings: &dyn EmbeddingProvider,
        draft: NewEntityRelation,
    ) -> Result<uuid::Uuid> {
        let candidates = store
            .find_invalidation_candidates(draft.from_id, &draft.relation_type)
            .await?;

        if candidates.is_empty() {
            return store.add_entity_relation(draft).await;
        }

        let from_id = draft.from_id;
        let to_id = draft.to_id;
        let relation_type = draft.relation_type.clone();
        let new_id = store.add_entity_relation(draft).await?;

        let subject = store.get_entity(from_id).await?;
        let object = store.get_entity(to_id).await?;
        let (Some(subject), Some(object)) = (subject, object) else {
            return Ok(new_id);
        };

        let prompt = build_prompt(&subject.name, relation_type.as_str(), &object.name, &candidates, store).await?;

        let Ok(response) = embeddings.generate(&prompt).await else {
            return Ok(new_id);
        };

        let Some(verdict) = parse_verdict(&response) else {
            return Ok(new_id);
        };

        for id in verdict.invalidated_ids {
            if candidates.iter().any(|c| c.id == id) {
                let _ = store.invalidate_relation(id, new_id).await;
            }
        }

        Ok(new_id)
    }

    /// Drop the in-flight entry once no other waiter still holds a clone of
    /// it, matching `PyramidCompressor::release`.
    fn release(&self, key: Key, lock: &Arc<AsyncMutex<()>>) {
        let mut map = self.locks.lock();
        if let Some(entry) = map.get(&key) {
            if Arc::ptr_eq(entry, lock) && Arc::strong_count(entry) <= 2 {
                map.remove(&key);
            }
        }
    }
}

async fn build_prompt(
    subject_name: &str,
    predicate: &str,
    object_name: &str,
    candidates: &[EntityRelation],
    store: &dyn GraphStore,
) -> Result<String> {
    let mut prompt = format!(
        "New fact: {subject_name} {predicate} {object_name}.\n\
         Existing facts that may be contradicted:\n"
    );
    for c in candidates {
        let object = store
            .get_entity(c.to_id)
            .await?
            .map_or_else(|| c.to_id.to_string(), |e| e.name);
        prompt.push_str(&format!(
            "- id={id} {subject_name} {predicate} {object}\n",
            id = c.id
        ));
    }
    prompt.push_str(
        "\nWhich of these existing facts, if any, are contradicted by the new fact? \
         Reply with a JSON object: {\"invalidated_ids\": [...], \"reason\": \"...\"}.",
    );
    Ok(prompt)
}

/// Parse a model response defensively: tolerate surrounding prose or a
/// fenced code block, and locate the first `{...}` region before decoding
/// (spec §9 design notes).
fn parse_verdict(response: &str) -> Option<InvalidationVerdict> {
    let stripped = crate::jsonutil::strip_code_fences(response);
    let json_slice = crate::jsonutil::first_json_object(stripped)?;
    serde_json::from_str(json_slice).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let v = parse_verdict(r#"{"invalidated_ids": [], "reason": "no conflict"}"#);
        assert!(v.is_some());
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let text = format!(
            "Sure, here is my answer:\n{}\nLet me know if you need more.",
            r#"{"invalidated_ids": [], "reason": "none"}"#
        );
        assert!(parse_verdict(&text).is_some());
    }

    #[test]
    fn parses_json_in_fenced_code_block() {
        let text = "```json\n{\"invalidated_ids\": [], \"reason\": \"none\"}\n```";
        assert!(parse_verdict(text).is_some());
    }

    #[test]
    fn returns_none_for_unparseable_garbage() {
        assert!(parse_verdict("the model refused to answer").is_none());
    }
}

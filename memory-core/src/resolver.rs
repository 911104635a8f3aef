//! Entity Resolver (C6, spec §4.4).
//!
//! Maps an [`ExtractedEntity`] to a canonical [`Entity`], creating one if
//! nothing matches. The cascade is exact-canonical, then alias, then
//! embedding similarity within the same type, then create-new; first
//! success wins.

use crate::constants::resolution::{
    ALIAS_SIMILARITY_THRESHOLD, NEW_ENTITY_SALIENCE, SALIENCE_MATCH_INCREMENT,
};
use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::error::Result;
use crate::graph::{GraphStore, NewEntity};
use crate::types::{Entity, ExtractedEntity, MatchedBy, ResolutionOutcome};

/// Resolve `mention` against the entity graph in `store`, creating a new
/// entity if no existing one matches closely enough.
///
/// On a match, the entity's salience is incremented by
/// [`SALIENCE_MATCH_INCREMENT`]; on an embedding match, the mention string is
/// also recorded as a new alias. Resolution is idempotent modulo salience
/// accrual: resolving the same input twice returns the same entity id both
/// times and never creates a second row for it.
pub async fn resolve(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    mention: &ExtractedEntity,
) -> Result<ResolutionOutcome> {
    if let Some(entity) = store.find_entity_by_canonical_name(&mention.name).await? {
        store
            .increment_entity_salience(entity.id, SALIENCE_MATCH_INCREMENT)
            .await?;
        return Ok(ResolutionOutcome {
            entity,
            is_new: false,
            matched_by: MatchedBy::Canonical,
        });
    }

    if let Some(entity) = store.find_entity_by_alias(&mention.name).await? {
        store
            .increment_entity_salience(entity.id, SALIENCE_MATCH_INCREMENT)
            .await?;
        return Ok(ResolutionOutcome {
            entity,
            is_new: false,
            matched_by: MatchedBy::Alias,
        });
    }

    let mention_embedding = embeddings.embed(&mention.name).await?;
    let candidates = store.find_entities_by_type(mention.entity_type).await?;
    if let Some(entity) = best_embedding_match(&candidates, &mention_embedding) {
        store.add_entity_alias(entity.id, &mention.name).await?;
        store
            .increment_entity_salience(entity.id, SALIENCE_MATCH_INCREMENT)
            .await?;
        return Ok(ResolutionOutcome {
            entity,
            is_new: false,
            matched_by: MatchedBy::Embedding,
        });
    }

    let entity = store
        .add_entity(NewEntity {
            name: mention.name.clone(),
            entity_type: mention.entity_type,
            salience: NEW_ENTITY_SALIENCE,
            embedding: mention_embedding,
        })
        .await?;
    Ok(ResolutionOutcome {
        entity,
        is_new: true,
        matched_by: MatchedBy::New,
    })
}

fn best_embedding_match(candidates: &[Entity], mention_embedding: &[f32]) -> Option<Entity> {
    candidates
        .iter()
        .map(|e| (e, cosine_similarity(&e.embedding, mention_embedding)))
        .filter(|(_, sim)| *sim >= ALIAS_SIMILARITY_THRESHOLD)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(e, _)| e.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entity(name: &str, embedding: Vec<f32>) -> Entity {
        Entity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            entity_type: crate::types::EntityType::Person,
            salience: 1.0,
            embedding,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn best_embedding_match_picks_highest_similarity_above_threshold() {
        let a = entity("A", vec![1.0, 0.0]);
        let b = entity("B", vec![0.0, 1.0]);
        let query = vec![1.0, 0.0];
        let result = best_embedding_match(&[a.clone(), b], &query);
        assert_eq!(result.unwrap().id, a.id);
    }

    #[test]
    fn best_embedding_match_returns_none_below_threshold() {
        let a = entity("A", vec![1.0, 0.0]);
        let query = vec![0.0, 1.0];
        assert!(best_embedding_match(&[a], &query).is_none());
    }
}

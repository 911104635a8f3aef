//! Entity and EntityRelation: canonical identities and the typed, temporally
//! scoped edges between them (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EntityType, RelationType};

/// A canonical identity for a real-world or conceptual referent.
///
/// Aliases and mentions are stored as separate rows the Graph Model owns
/// (`entity_aliases`, `episode_mentions`); this struct is the entity's own
/// scalar attributes only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub entity_type: EntityType,
    pub salience: f32,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A directed, typed, temporally-scoped edge between two entities.
///
/// Active iff `invalid_at` is `None`. The tuple `(from_id, relation_type,
/// to_id)` may repeat over time as beliefs change; history is preserved by
/// superseding rather than overwriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelation {
    pub id: Uuid,
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub relation_type: RelationType,
    pub weight: f32,
    pub valid_at: DateTime<Utc>,
    pub invalid_at: Option<DateTime<Utc>>,
    pub invalidated_by: Option<Uuid>,
    pub source_episode_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl EntityRelation {
    /// A relation is active iff it has not been superseded.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.invalid_at.is_none() && self.invalidated_by.is_none()
    }
}

/// An entity mention extracted from an episode, prior to resolution
/// (spec §4.4 input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f32,
    /// Byte-offset span of the mention within the source text, for callers
    /// that want to highlight it; not consulted by resolution itself.
    pub span: Option<(usize, usize)>,
}

/// An extracted relationship between two mentions, prior to endpoint
/// resolution (spec §4.7 step 7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub subject: ExtractedEntity,
    pub object: ExtractedEntity,
    pub relation_type: RelationType,
    pub weight: f32,
}

/// How a mention was matched to its canonical entity (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Canonical,
    Alias,
    Embedding,
    New,
}

/// Outcome of resolving one [`ExtractedEntity`] against the entity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub entity: Entity,
    pub is_new: bool,
    pub matched_by: MatchedBy,
}

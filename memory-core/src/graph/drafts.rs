//! Input structs for the three `add_*` operations on [`super::GraphStore`].
//!
//! These carry everything the store needs except the fields the store
//! itself is responsible for assigning (`id`, `short_id`, timestamps it
//! defaults), so that id assignment and short-id collision probing happen
//! inside the same transaction as the insert rather than in a caller that
//! might race another insert.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{DialogueAct, EntityType, RelationType, TraceType};

/// Fields needed to insert a new [`crate::types::Episode`].
#[derive(Debug, Clone)]
pub struct NewEpisode {
    pub content: String,
    pub source: String,
    pub author: String,
    pub author_id: Option<String>,
    pub channel: Option<String>,
    pub reply_to: Option<Uuid>,
    /// Defaults to now if not supplied by the caller (e.g. a backfill job
    /// importing history with known event times).
    pub timestamp_event: Option<DateTime<Utc>>,
    pub dialogue_act: DialogueAct,
    pub entropy_score: f32,
    pub embedding: Vec<f32>,
    pub token_count: u32,
}

/// Fields needed to insert a new [`crate::types::Trace`].
#[derive(Debug, Clone)]
pub struct NewTrace {
    pub summary: String,
    pub topic: String,
    pub trace_type: TraceType,
    pub embedding: Vec<f32>,
    pub is_core: bool,
}

/// Fields needed to insert a new [`crate::types::Entity`].
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub salience: f32,
    pub embedding: Vec<f32>,
}

/// Fields needed to insert a new [`crate::types::EntityRelation`].
#[derive(Debug, Clone)]
pub struct NewEntityRelation {
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub relation_type: RelationType,
    pub weight: f32,
    pub valid_at: DateTime<Utc>,
    pub source_episode_id: Uuid,
}

//! Table layout for the persisted graph (spec §6): one redb table per node
//! kind plus the secondary-index and edge tables the Graph Model's lookups
//! need. Keys are raw bytes (16-byte UUIDs, or UUID-prefixed composite keys
//! for per-entity-per-level rows); values are postcard-encoded domain
//! structs, following the teacher's `TableDefinition<&str, &[u8]>` idiom.

use redb::TableDefinition;

/// Maximum size, in bytes, accepted for a single postcard-encoded row
/// before decoding. Guards against a corrupted or maliciously large value
/// driving an unbounded allocation.
pub(crate) const MAX_ROW_SIZE: usize = 10_000_000;

pub(crate) const EPISODES_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("episodes");
pub(crate) const EPISODE_SHORT_ID_INDEX: TableDefinition<&str, &[u8]> =
    TableDefinition::new("episode_short_id_index");
pub(crate) const EPISODE_SUMMARIES_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("episode_summaries");

pub(crate) const TRACES_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("traces");
pub(crate) const TRACE_SHORT_ID_INDEX: TableDefinition<&str, &[u8]> =
    TableDefinition::new("trace_short_id_index");
pub(crate) const TRACE_SOURCES_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("trace_sources");
pub(crate) const TRACE_ENTITIES_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("trace_entities");
pub(crate) const TRACE_NEIGHBORS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("trace_neighbors");

pub(crate) const ENTITIES_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entities");
pub(crate) const ENTITY_CANONICAL_INDEX: TableDefinition<&str, &[u8]> =
    TableDefinition::new("entity_canonical_index");
pub(crate) const ENTITY_ALIAS_INDEX: TableDefinition<&str, &[u8]> =
    TableDefinition::new("entity_alias_index");
pub(crate) const ENTITY_ALIASES_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("entity_aliases");
pub(crate) const ENTITY_TRACES_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("entity_traces");

pub(crate) const ENTITY_RELATIONS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("entity_relations");
pub(crate) const SUBJECT_RELATIONS_INDEX: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("subject_relations_index");

pub(crate) const EPISODE_MENTIONS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("episode_mentions");
pub(crate) const ENTITY_MENTIONS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("entity_mentions");

/// Composite key for an `(episode_id, level)` summary row: 16-byte UUID
/// followed by a one-byte level discriminant.
pub(crate) fn summary_key(episode_id: uuid::Uuid, level: memory_core::types::SummaryLevel) -> Vec<u8> {
    let mut key = episode_id.as_bytes().to_vec();
    key.push(match level {
        memory_core::types::SummaryLevel::Short => 0,
        memory_core::types::SummaryLevel::Medium => 1,
    });
    key
}

/// Composite key for the subject-relations index: 16-byte subject UUID
/// followed by the UTF-8 bytes of the relation type.
pub(crate) fn subject_relation_key(subject: uuid::Uuid, relation_type: &memory_core::types::RelationType) -> Vec<u8> {
    let mut key = subject.as_bytes().to_vec();
    key.extend_from_slice(relation_type.as_str().as_bytes());
    key
}

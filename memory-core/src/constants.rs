//! Magic numbers centralized in one place, as defaults overridable by
//! [`crate::config::Config`] or per-call parameters.

/// Retrieval tuning (spec §4.2).
pub mod retrieval {
    /// Default `k` when a caller omits `limit`.
    pub const DEFAULT_K: usize = 10;
    /// Hard cap on `k` regardless of what the caller requests.
    pub const MAX_K: usize = 20;
    /// Dense-seed candidate pool size before truncation.
    pub const DENSE_SEED_POOL: usize = 50;
    /// Dense-seed similarity floor; candidates below this are dropped.
    pub const DENSE_SEED_FLOOR: f32 = 0.2;
    /// Weight applied to the dense (cosine) seed contribution.
    pub const WEIGHT_DENSE: f32 = 1.0;
    /// Weight applied to the lexical overlap seed contribution.
    pub const WEIGHT_LEXICAL: f32 = 0.4;
    /// Weight applied to the entity-grounding seed contribution.
    pub const WEIGHT_ENTITY: f32 = 0.3;
    /// Weight applied to the context-bias seed contribution.
    pub const WEIGHT_CONTEXT: f32 = 0.5;
    /// Number of spreading-activation passes (Phase B).
    pub const SPREAD_PASSES: usize = 2;
    /// Per-hop activation decay multiplier.
    pub const SPREAD_DECAY: f32 = 0.5;
    /// Activation floor below which a trace does not propagate further.
    pub const SPREAD_FLOOR: f32 = 0.01;
    /// Weight of normalized strength in the final score (Phase C).
    pub const WEIGHT_STRENGTH: f32 = 0.2;
    /// Weight of the recency boost in the final score (Phase C).
    pub const WEIGHT_RECENCY: f32 = 0.1;
    /// Access-boost delta applied to every returned trace (Phase D).
    pub const ACCESS_BOOST_DELTA: i64 = 1;
    /// Half-life, in hours, used by the coarse-cadence activation decay.
    pub const DEFAULT_HALF_LIFE_HOURS: f64 = 72.0;
    /// Recency-boost window, in hours, for Phase C scoring (spec §4.2).
    pub const RECENCY_WINDOW_HOURS: i64 = 168;
    /// Candidate pool size for the entity seed's text match (Phase A.3).
    pub const ENTITY_SEED_MAX_MATCHES: usize = 10;
}

/// Entity resolution tuning (spec §4.4).
pub mod resolution {
    /// Minimum cosine similarity to accept an embedding match against an
    /// existing entity of the same type.
    pub const ALIAS_SIMILARITY_THRESHOLD: f32 = 0.88;
    /// Salience increment applied on every successful resolution match.
    pub const SALIENCE_MATCH_INCREMENT: f32 = 0.1;
    /// Initial salience assigned to a newly created entity.
    pub const NEW_ENTITY_SALIENCE: f32 = 1.0;
}

/// Pyramid compression levels (spec §4.3). Additional levels can be added
/// without changing callers, since [`crate::types::episode::SummaryLevel`]
/// is the closed enum callers actually match against.
pub mod pyramid {
    /// Target word count for the short summary level.
    pub const LEVEL_SHORT_WORDS: u32 = 8;
    /// Target word count for the medium summary level.
    pub const LEVEL_MEDIUM_WORDS: u32 = 32;
}

/// Context window assembly (spec §4.8).
pub mod context {
    /// Default cap on episodes considered for the conversation window.
    pub const DEFAULT_MAX_EPISODES: usize = 30;
    /// Default cap on retrieved traces included alongside the window.
    pub const DEFAULT_MAX_TRACES: usize = 10;
    /// Newest N episodes rendered with full content.
    pub const FULL_CONTENT_COUNT: usize = 5;
    /// Next N episodes (after the full-content window) rendered at the
    /// medium (level-32) summary.
    pub const MEDIUM_SUMMARY_COUNT: usize = 10;
}

/// Short-id generation (spec §4.1).
pub mod short_id {
    /// Length, in characters, of a generated short id.
    pub const LENGTH: usize = 5;
    /// Base32 alphabet used for short ids (Crockford, lowercased, no
    /// ambiguous characters).
    pub const ALPHABET: &str = "0123456789abcdefghjkmnpqrstvwxyz";
    /// Maximum number of collision-probe retries before giving up.
    pub const MAX_COLLISION_RETRIES: u32 = 64;
}

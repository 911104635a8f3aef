//! Episode: a single immutable utterance or observation (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DialogueAct;

/// A fixed summary level the Pyramid Compressor produces (spec §4.3).
/// Closed enum rather than an arbitrary word count, per spec §9's guidance
/// to replace "dynamic any" axes with explicit variants; new levels are
/// additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryLevel {
    /// ~8-word gist.
    Short,
    /// ~32-word digest.
    Medium,
}

impl SummaryLevel {
    /// Target word count for this level.
    #[must_use]
    pub fn target_words(self) -> u32 {
        match self {
            SummaryLevel::Short => crate::constants::pyramid::LEVEL_SHORT_WORDS,
            SummaryLevel::Medium => crate::constants::pyramid::LEVEL_MEDIUM_WORDS,
        }
    }
}

/// A single immutable utterance or observation.
///
/// Once created, `content`, `timestamp_event`, and `embedding` never change;
/// only associated rows (summaries, mentions) accrue around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub short_id: String,
    pub content: String,
    /// Free-form channel label (e.g. "slack:#general", "discord-dm").
    pub source: String,
    pub author: String,
    pub author_id: Option<String>,
    pub channel: Option<String>,
    /// Episode this one replies to, if any. Must reference an existing
    /// episode at insert time.
    pub reply_to: Option<Uuid>,
    pub timestamp_event: DateTime<Utc>,
    pub timestamp_ingested: DateTime<Utc>,
    pub dialogue_act: DialogueAct,
    /// Advisory informativeness score in `[0, 1]` (spec §4.5).
    pub entropy_score: f32,
    pub embedding: Vec<f32>,
    pub token_count: u32,
}

/// A cached, lazily-produced compression of an episode at a fixed level.
///
/// At most one row exists per `(episode_id, level)`; since episode content
/// is immutable, a summary is deterministic and re-derivable, so it is never
/// invalidated, only (re)computed once and cached forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode_id: Uuid,
    pub level: SummaryLevel,
    pub summary: String,
    pub token_count: u32,
    pub embedding: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_level_targets_match_spec_constants() {
        assert_eq!(SummaryLevel::Short.target_words(), 8);
        assert_eq!(SummaryLevel::Medium.target_words(), 32);
    }
}

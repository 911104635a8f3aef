//! Trace: a consolidated memory derived from one or more episodes (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EdgeType, TraceType};

/// A consolidated, summarized memory.
///
/// Edges live outside this struct (as rows the Graph Model owns: see
/// `trace-source-episode`, `trace-entity`, `trace-neighbor` in spec §3) so
/// the in-memory representation never becomes a cyclic owning-pointer graph
/// (spec §9 design notes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: Uuid,
    pub short_id: String,
    pub summary: String,
    pub topic: String,
    pub trace_type: TraceType,
    pub embedding: Vec<f32>,
    /// Monotonically accrues from access; never decremented outside of
    /// explicit maintenance tooling this core does not own.
    pub strength: u32,
    /// Decaying scalar, persisted as a column and never held in a
    /// process-local map (spec §9 design notes).
    pub activation: f32,
    pub is_core: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl Trace {
    /// Strength normalized against a running max for use in scoring
    /// (spec §4.2 Phase C `strength_norm`). Returns `0.0` when `max` is `0`.
    #[must_use]
    pub fn strength_norm(&self, max: u32) -> f32 {
        if max == 0 {
            0.0
        } else {
            self.strength as f32 / max as f32
        }
    }

    /// Recency boost: `1.0` for a trace accessed just now, decaying linearly
    /// to `0.0` over `window`. Used in Phase C scoring.
    #[must_use]
    pub fn recency_boost(&self, now: DateTime<Utc>, window: chrono::Duration) -> f32 {
        let age = now - self.last_accessed;
        if age <= chrono::Duration::zero() {
            return 1.0;
        }
        if age >= window {
            return 0.0;
        }
        1.0 - (age.num_milliseconds() as f32 / window.num_milliseconds() as f32)
    }
}

/// A typed, weighted edge between two traces (`trace-neighbor`, spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceNeighbor {
    pub from: Uuid,
    pub to: Uuid,
    pub edge_type: EdgeType,
    pub weight: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trace(strength: u32, last_accessed: DateTime<Utc>) -> Trace {
        Trace {
            id: Uuid::new_v4(),
            short_id: "abcde".into(),
            summary: "summary".into(),
            topic: "topic".into(),
            trace_type: TraceType::Episodic,
            embedding: vec![0.0; 4],
            strength,
            activation: 0.0,
            is_core: false,
            created_at: Utc::now(),
            last_accessed,
        }
    }

    #[test]
    fn strength_norm_handles_zero_max() {
        let t = sample_trace(5, Utc::now());
        assert_eq!(t.strength_norm(0), 0.0);
    }

    #[test]
    fn strength_norm_divides_by_max() {
        let t = sample_trace(5, Utc::now());
        assert_eq!(t.strength_norm(10), 0.5);
    }

    #[test]
    fn recency_boost_is_one_for_just_accessed() {
        let t = sample_trace(0, Utc::now());
        let boost = t.recency_boost(Utc::now(), chrono::Duration::hours(1));
        assert!(boost > 0.99);
    }

    #[test]
    fn recency_boost_is_zero_outside_window() {
        let t = sample_trace(0, Utc::now() - chrono::Duration::days(10));
        let boost = t.recency_boost(Utc::now(), chrono::Duration::hours(1));
        assert_eq!(boost, 0.0);
    }
}

//! Spreading-Activation Retriever (C9, spec §4.2).
//!
//! Retrieves the top-k traces most relevant to a query by blending dense
//! (embedding) similarity, lexical overlap, entity grounding, and context
//! bias into a single activation map, then spreading that activation across
//! `trace-neighbor` edges for a fixed number of passes. Deterministic given
//! identical inputs and embeddings.

use std::collections::HashMap;

use uuid::Uuid;

use crate::constants::retrieval::*;
use crate::dialogue::content_tokens;
use crate::embeddings::cosine_similarity;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::types::Trace;

/// A trace plus the final score it was retrieved with.
#[derive(Debug, Clone)]
pub struct ScoredTrace {
    pub trace: Trace,
    pub score: f32,
}

/// Clamp a caller-supplied `limit` per spec §8 boundary behavior: `0` (or
/// absent) becomes the default, anything above the hard cap is clamped down
/// to it.
#[must_use]
pub fn clamp_k(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_K,
        Some(k) => k.min(MAX_K),
    }
}

/// Run the full retrieval pipeline and apply the Phase D access-boost side
/// effect to the returned traces.
pub async fn retrieve(
    store: &dyn GraphStore,
    query_text: &str,
    query_embedding: &[f32],
    context_ids: &[Uuid],
    k: usize,
) -> Result<Vec<ScoredTrace>> {
    let all = store.all_traces().await?;
    if all.is_empty() {
        return Ok(Vec::new());
    }

    let mut activation: HashMap<Uuid, f32> = HashMap::new();
    seed_dense(&mut activation, &all, query_embedding);
    seed_lexical(&mut activation, &all, query_text);
    seed_entities(store, &mut activation, &all, query_text).await?;
    seed_context(store, &mut activation, context_ids).await?;

    spread(store, &mut activation).await?;

    let results = score_and_rank(&all, &activation, k);

    let ids: Vec<Uuid> = results.iter().map(|r| r.trace.id).collect();
    if !ids.is_empty() {
        store.boost_trace_access(&ids, ACCESS_BOOST_DELTA as u32).await?;
    }

    Ok(results)
}

fn seed_dense(activation: &mut HashMap<Uuid, f32>, traces: &[Trace], query_embedding: &[f32]) {
    let mut scored: Vec<(Uuid, f32)> = traces
        .iter()
        .map(|t| (t.id, cosine_similarity(&t.embedding, query_embedding)))
        .filter(|(_, sim)| *sim >= DENSE_SEED_FLOOR)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(DENSE_SEED_POOL);

    for (id, sim) in scored {
        *activation.entry(id).or_insert(0.0) += WEIGHT_DENSE * sim;
    }
}

fn seed_lexical(activation: &mut HashMap<Uuid, f32>, traces: &[Trace], query_text: &str) {
    let query_tokens = content_tokens(query_text);
    if query_tokens.is_empty() {
        return;
    }

    for trace in traces {
        let summary_tokens: std::collections::HashSet<String> =
            content_tokens(&trace.summary).into_iter().collect();
        let overlap = query_tokens
            .iter()
            .filter(|t| summary_tokens.contains(t.as_str()))
            .count();
        if overlap == 0 {
            continue;
        }
        let overlap_fraction = overlap as f32 / query_tokens.len() as f32;
        *activation.entry(trace.id).or_insert(0.0) += WEIGHT_LEXICAL * overlap_fraction;
    }
}

async fn seed_entities(
    store: &dyn GraphStore,
    activation: &mut HashMap<Uuid, f32>,
    traces: &[Trace],
    query_text: &str,
) -> Result<()> {
    let _ = traces;
    let matches = store
        .find_entities_by_text(query_text, ENTITY_SEED_MAX_MATCHES)
        .await?;
    if matches.is_empty() {
        return Ok(());
    }

    let max_salience = matches.iter().map(|e| e.salience).fold(0.0_f32, f32::max);
    for entity in &matches {
        let salience_norm = if max_salience <= 0.0 {
            0.0
        } else {
            entity.salience / max_salience
        };
        for trace_id in store.get_traces_for_entity(entity.id).await? {
            *activation.entry(trace_id).or_insert(0.0) += WEIGHT_ENTITY * salience_norm;
        }
    }
    Ok(())
}

async fn seed_context(
    store: &dyn GraphStore,
    activation: &mut HashMap<Uuid, f32>,
    context_ids: &[Uuid],
) -> Result<()> {
    for &id in context_ids {
        *activation.entry(id).or_insert(0.0) += WEIGHT_CONTEXT;
        // Unknown context ids simply yield no neighbors; this is the
        // "silently ignored" behavior spec §4.2 requires.
        for neighbor in store.get_trace_neighbors(id).await? {
            *activation.entry(neighbor.to).or_insert(0.0) += WEIGHT_CONTEXT * neighbor.weight;
        }
    }
    Ok(())
}

async fn spread(store: &dyn GraphStore, activation: &mut HashMap<Uuid, f32>) -> Result<()> {
    for _pass in 0..SPREAD_PASSES {
        let snapshot: Vec<(Uuid, f32)> = activation
            .iter()
            .filter(|(_, &a)| a > SPREAD_FLOOR)
            .map(|(&id, &a)| (id, a))
            .collect();

        let mut delta: HashMap<Uuid, f32> = HashMap::new();
        for (u, a_u) in snapshot {
            for neighbor in store.get_trace_neighbors(u).await? {
                *delta.entry(neighbor.to).or_insert(0.0) += a_u * SPREAD_DECAY * neighbor.weight;
            }
        }

        for (id, d) in delta {
            *activation.entry(id).or_insert(0.0) += d;
        }
    }
    Ok(())
}

fn score_and_rank(traces: &[Trace], activation: &HashMap<Uuid, f32>, k: usize) -> Vec<ScoredTrace> {
    let now = crate::graph::now();
    let window = chrono::Duration::hours(RECENCY_WINDOW_HOURS);
    let max_strength = traces.iter().map(|t| t.strength).max().unwrap_or(0);

    let mut scored: Vec<ScoredTrace> = traces
        .iter()
        .filter_map(|t| {
            let a = *activation.get(&t.id)?;
            let score = a
                + WEIGHT_STRENGTH * t.strength_norm(max_strength)
                + WEIGHT_RECENCY * t.recency_boost(now, window);
            Some(ScoredTrace {
                trace: t.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.trace.created_at.cmp(&b.trace.created_at))
    });
    scored.truncate(k.max(1).min(MAX_K));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_k_defaults_on_zero_or_missing() {
        assert_eq!(clamp_k(None), DEFAULT_K);
        assert_eq!(clamp_k(Some(0)), DEFAULT_K);
    }

    #[test]
    fn clamp_k_caps_at_hard_max() {
        assert_eq!(clamp_k(Some(1000)), MAX_K);
    }

    #[test]
    fn clamp_k_passes_through_in_range_values() {
        assert_eq!(clamp_k(Some(3)), 3);
    }

    #[test]
    fn seed_lexical_ignores_traces_with_no_overlap() {
        let mut activation = HashMap::new();
        let traces = vec![sample_trace("totally unrelated topic")];
        seed_lexical(&mut activation, &traces, "blue bottle coffee");
        assert!(activation.is_empty());
    }

    #[test]
    fn seed_lexical_scores_by_overlap_fraction() {
        let mut activation = HashMap::new();
        let traces = vec![sample_trace("likes blue bottle coffee on market street")];
        seed_lexical(&mut activation, &traces, "blue bottle coffee");
        assert!(activation.values().next().unwrap() > &0.0);
    }

    fn sample_trace(summary: &str) -> Trace {
        Trace {
            id: Uuid::new_v4(),
            short_id: "abcde".into(),
            summary: summary.into(),
            topic: "topic".into(),
            trace_type: crate::types::TraceType::Episodic,
            embedding: vec![0.0; 4],
            strength: 0,
            activation: 0.0,
            is_core: false,
            created_at: chrono::Utc::now(),
            last_accessed: chrono::Utc::now(),
        }
    }
}

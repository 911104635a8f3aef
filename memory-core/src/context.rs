//! Context Assembler (C11, spec §4.8).
//!
//! Builds a bounded "recent conversation" window: the newest episodes in
//! full, older ones as progressively shorter pyramid summaries, plus an
//! optional retrieval pass layered alongside it.

use uuid::Uuid;

use crate::constants::context::{FULL_CONTENT_COUNT, MEDIUM_SUMMARY_COUNT};
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::pyramid::PyramidCompressor;
use crate::retrieval::{self, ScoredTrace};
use crate::types::{Episode, SummaryLevel};

/// One rendered line of the conversation window, oldest-first.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationLine {
    pub short_id: String,
    pub author: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub text: String,
}

impl ConversationLine {
    /// Render as `[short_id] [hh:mm] author: text` (spec §4.8).
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "[{}] [{}] {}: {}",
            self.short_id,
            self.timestamp.format("%H:%M"),
            self.author,
            self.text
        )
    }
}

/// Output of [`assemble`].
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub lines: Vec<ConversationLine>,
    pub retrieved: Vec<ScoredTrace>,
}

impl AssembledContext {
    /// The conversation window rendered as one string, one line per episode.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(ConversationLine::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build a bounded conversation window, optionally layering in a retrieval
/// pass for `query`.
///
/// The newest [`FULL_CONTENT_COUNT`] episodes are rendered with raw content;
/// the next [`MEDIUM_SUMMARY_COUNT`] with level-32 summaries; the remainder
/// with level-8 summaries. The result is reversed so the oldest episode is
/// first.
#[allow(clippy::too_many_arguments)]
pub async fn assemble(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    compressor: &PyramidCompressor,
    channel: Option<&str>,
    max_episodes: usize,
    max_traces: usize,
    query: Option<(&str, &[f32])>,
    context_ids: &[Uuid],
) -> Result<AssembledContext> {
    let episodes = store.get_recent_episodes(channel, max_episodes).await?;

    let mut lines = Vec::with_capacity(episodes.len());
    for (idx, episode) in episodes.iter().enumerate() {
        let text = render_text(store, embeddings, compressor, episode, idx).await?;
        lines.push(ConversationLine {
            short_id: episode.short_id.clone(),
            author: episode.author.clone(),
            timestamp: episode.timestamp_event,
            text,
        });
    }
    lines.reverse();

    let retrieved = if let Some((query_text, query_embedding)) = query {
        let k = retrieval::clamp_k(Some(max_traces));
        retrieval::retrieve(store, query_text, query_embedding, context_ids, k).await?
    } else {
        Vec::new()
    };

    Ok(AssembledContext { lines, retrieved })
}

async fn render_text(
    store: &dyn GraphStore,
    embeddings: &dyn EmbeddingProvider,
    compressor: &PyramidCompressor,
    episode: &Episode,
    newest_first_index: usize,
) -> Result<String> {
    if newest_first_index < FULL_CONTENT_COUNT {
        return Ok(episode.content.clone());
    }

    let level = if newest_first_index < FULL_CONTENT_COUNT + MEDIUM_SUMMARY_COUNT {
        SummaryLevel::Medium
    } else {
        SummaryLevel::Short
    };

    let summary = compressor
        .get_summary(store, embeddings, episode, level)
        .await?;
    Ok(summary.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn conversation_line_renders_expected_shape() {
        let line = ConversationLine {
            short_id: "abcde".into(),
            author: "u1".into(),
            timestamp: Utc::now(),
            text: "hello".into(),
        };
        let rendered = line.render();
        assert!(rendered.starts_with("[abcde] ["));
        assert!(rendered.ends_with("u1: hello"));
    }
}

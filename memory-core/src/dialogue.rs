//! Dialogue-Act & Entropy Filter (C8, spec §4.5).
//!
//! Classifies an utterance's pragmatic type with an ordered regex cascade
//! (first match wins) and scores its informativeness in `[0, 1]`. Both are
//! advisory: stored on the episode, consulted by downstream compaction
//! policy, never gating ingestion itself.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::DialogueAct;

struct Cascade {
    act: DialogueAct,
    pattern: &'static str,
}

const CASCADE: &[Cascade] = &[
    Cascade {
        act: DialogueAct::Backchannel,
        pattern: r"(?i)^\s*(yeah|yep|yup|uh+-?huh|mh+m+|ok(ay)?|k|right|sure|cool|nice|got it|i see|gotcha)\s*[.!]*\s*$",
    },
    Cascade {
        act: DialogueAct::Greeting,
        pattern: r"(?i)^\s*(hi|hey|hello|good (morning|afternoon|evening|night)|yo|sup|bye|goodbye|see ya|talk (soon|later)|cya)\b",
    },
    Cascade {
        act: DialogueAct::Question,
        pattern: r"(?i)(\?\s*$)|^\s*(who|what|when|where|why|how|which|is|are|do|does|did|can|could|would|should|will)\b",
    },
    Cascade {
        act: DialogueAct::Command,
        pattern: r"(?i)^\s*(please\s+)?(do|make|create|add|remove|delete|set|update|run|send|call|show|list|find|open|close|stop|start)\b",
    },
];

fn cascade_regexes() -> &'static Vec<Regex> {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        CASCADE
            .iter()
            .map(|c| Regex::new(c.pattern).expect("static cascade pattern compiles"))
            .collect()
    })
}

fn stop_words() -> &'static HashSet<&'static str> {
    static CELL: OnceLock<HashSet<&'static str>> = OnceLock::new();
    CELL.get_or_init(|| {
        [
            "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "to", "of",
            "in", "on", "at", "for", "and", "or", "but", "with", "i", "you", "it", "this", "that",
        ]
        .into_iter()
        .collect()
    })
}

fn url_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"(?i)\bhttps?://\S+").expect("static url pattern compiles"))
}

/// Classify an utterance's dialogue act. Falls through to
/// [`DialogueAct::Statement`] when nothing in the cascade matches.
#[must_use]
pub fn classify(text: &str) -> DialogueAct {
    let regexes = cascade_regexes();
    for (cascade, re) in CASCADE.iter().zip(regexes.iter()) {
        if re.is_match(text) {
            return cascade.act;
        }
    }
    DialogueAct::Statement
}

/// Content tokens of `text`: lowercased, punctuation stripped, stop words
/// dropped. Shared with the Retriever's lexical seed (spec §4.2 Phase A.2).
#[must_use]
pub fn content_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !stop_words().contains(w.as_str()))
        .collect()
}

/// Lexical diversity: distinct content tokens over total content tokens, in
/// `[0, 1]`. `0.0` for an empty token list.
#[must_use]
pub fn lexical_diversity(tokens: &[String]) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    distinct.len() as f32 / tokens.len() as f32
}

/// Score an utterance's informativeness in `[0, 1]` (spec §4.5).
///
/// Combines message length, presence of named entities or URLs, lexical
/// diversity, and dialogue act; `BACKCHANNEL`/`GREETING` are suppressed
/// toward zero regardless of the other signals.
#[must_use]
pub fn entropy_score(text: &str, act: DialogueAct, has_named_entities: bool) -> f32 {
    if matches!(act, DialogueAct::Backchannel | DialogueAct::Greeting) {
        return (text.split_whitespace().count() as f32 / 40.0).min(0.15);
    }

    let tokens = content_tokens(text);
    let length_component = (text.split_whitespace().count() as f32 / 30.0).min(1.0);
    let diversity_component = lexical_diversity(&tokens);
    let signal_component = f32::from(has_named_entities || url_regex().is_match(text));

    let score = 0.4 * length_component + 0.35 * diversity_component + 0.25 * signal_component;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_backchannel() {
        assert_eq!(classify("yeah"), DialogueAct::Backchannel);
        assert_eq!(classify("mhm"), DialogueAct::Backchannel);
    }

    #[test]
    fn classifies_greeting() {
        assert_eq!(classify("hey there, how's it going"), DialogueAct::Greeting);
    }

    #[test]
    fn classifies_question() {
        assert_eq!(classify("where does u1 like coffee"), DialogueAct::Question);
        assert_eq!(classify("is this ready?"), DialogueAct::Question);
    }

    #[test]
    fn classifies_command() {
        assert_eq!(classify("please add this to the list"), DialogueAct::Command);
    }

    #[test]
    fn falls_through_to_statement() {
        assert_eq!(
            classify("My favorite coffee shop is Blue Bottle on Market Street"),
            DialogueAct::Statement
        );
    }

    #[test]
    fn backchannel_entropy_is_low() {
        let score = entropy_score("yeah", DialogueAct::Backchannel, false);
        assert!(score < 0.2, "expected low entropy, got {score}");
    }

    #[test]
    fn long_statement_with_entities_scores_higher_than_short_backchannel() {
        let statement = entropy_score(
            "My favorite coffee shop is Blue Bottle on Market Street",
            DialogueAct::Statement,
            true,
        );
        let backchannel = entropy_score("yeah", DialogueAct::Backchannel, false);
        assert!(statement > backchannel);
    }

    #[test]
    fn content_tokens_drops_stop_words_and_punctuation() {
        let tokens = content_tokens("The coffee shop is on Market Street!");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"is".to_string()));
        assert!(tokens.contains(&"coffee".to_string()));
        assert!(tokens.contains(&"market".to_string()));
    }
}

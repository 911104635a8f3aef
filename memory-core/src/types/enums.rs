//! Closed enumerations for the graph model's "any" fields (spec §9: avoid
//! dynamic/stringly-typed payloads; give each axis an explicit, wire-stable
//! variant set instead).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pragmatic classification of an utterance (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogueAct {
    /// Filler acknowledgement ("yeah", "mhm", "ok").
    Backchannel,
    /// Opens or closes a conversation ("hi", "good morning", "talk later").
    Greeting,
    /// Seeks information.
    Question,
    /// Requests an action be taken.
    Command,
    /// Everything else: an assertion of fact or opinion.
    Statement,
}

impl fmt::Display for DialogueAct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DialogueAct::Backchannel => "BACKCHANNEL",
            DialogueAct::Greeting => "GREETING",
            DialogueAct::Question => "QUESTION",
            DialogueAct::Command => "COMMAND",
            DialogueAct::Statement => "STATEMENT",
        };
        f.write_str(s)
    }
}

impl FromStr for DialogueAct {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BACKCHANNEL" => Ok(DialogueAct::Backchannel),
            "GREETING" => Ok(DialogueAct::Greeting),
            "QUESTION" => Ok(DialogueAct::Question),
            "COMMAND" => Ok(DialogueAct::Command),
            "STATEMENT" => Ok(DialogueAct::Statement),
            other => Err(format!("unknown dialogue act: {other}")),
        }
    }
}

/// Canonical entity type vocabulary (spec §3, Entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Person,
    Org,
    Gpe,
    Loc,
    Fac,
    Product,
    Event,
    WorkOfArt,
    Law,
    Language,
    Norp,
    Date,
    Time,
    Money,
    Percent,
    Quantity,
    Cardinal,
    Ordinal,
    Other,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Person => "PERSON",
            EntityType::Org => "ORG",
            EntityType::Gpe => "GPE",
            EntityType::Loc => "LOC",
            EntityType::Fac => "FAC",
            EntityType::Product => "PRODUCT",
            EntityType::Event => "EVENT",
            EntityType::WorkOfArt => "WORK_OF_ART",
            EntityType::Law => "LAW",
            EntityType::Language => "LANGUAGE",
            EntityType::Norp => "NORP",
            EntityType::Date => "DATE",
            EntityType::Time => "TIME",
            EntityType::Money => "MONEY",
            EntityType::Percent => "PERCENT",
            EntityType::Quantity => "QUANTITY",
            EntityType::Cardinal => "CARDINAL",
            EntityType::Ordinal => "ORDINAL",
            EntityType::Other => "OTHER",
        };
        f.write_str(s)
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERSON" => Ok(EntityType::Person),
            "ORG" => Ok(EntityType::Org),
            "GPE" => Ok(EntityType::Gpe),
            "LOC" => Ok(EntityType::Loc),
            "FAC" => Ok(EntityType::Fac),
            "PRODUCT" => Ok(EntityType::Product),
            "EVENT" => Ok(EntityType::Event),
            "WORK_OF_ART" => Ok(EntityType::WorkOfArt),
            "LAW" => Ok(EntityType::Law),
            "LANGUAGE" => Ok(EntityType::Language),
            "NORP" => Ok(EntityType::Norp),
            "DATE" => Ok(EntityType::Date),
            "TIME" => Ok(EntityType::Time),
            "MONEY" => Ok(EntityType::Money),
            "PERCENT" => Ok(EntityType::Percent),
            "QUANTITY" => Ok(EntityType::Quantity),
            "CARDINAL" => Ok(EntityType::Cardinal),
            "ORDINAL" => Ok(EntityType::Ordinal),
            "OTHER" => Ok(EntityType::Other),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// A trace's provenance/role in the memory hierarchy (spec §3, Trace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    /// Derived directly from one or a few specific episodes.
    Episodic,
    /// A generalization distilled across many episodes.
    Semantic,
    /// Describes who the user (or another tracked party) is.
    Identity,
    /// Pinned, never evicted by routine maintenance.
    Core,
}

impl fmt::Display for TraceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraceType::Episodic => "episodic",
            TraceType::Semantic => "semantic",
            TraceType::Identity => "identity",
            TraceType::Core => "core",
        };
        f.write_str(s)
    }
}

/// Typed weight classification for a `trace-neighbor` edge (spec §3, Trace
/// edges; spec §9 design notes call for a closed enum here rather than an
/// untyped float-weighted edge list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Traces that share one or more entities.
    SharedEntity,
    /// Traces whose source episodes are temporally adjacent.
    Temporal,
    /// Traces linked because one was consolidated from the other.
    Derived,
    /// Traces linked by topical similarity at consolidation time.
    Topical,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeType::SharedEntity => "shared_entity",
            EdgeType::Temporal => "temporal",
            EdgeType::Derived => "derived",
            EdgeType::Topical => "topical",
        };
        f.write_str(s)
    }
}

/// An entity-relation predicate. Deliberately *not* a closed enum: spec §9
/// leaves the exact vocabulary implementation-defined and requires callers
/// to be able to extend it by configuration, so it is a thin, case-sensitive
/// string newtype instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationType(pub String);

impl RelationType {
    /// Wrap a string as a relation type.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the predicate as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RelationType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogue_act_round_trips_through_display_and_from_str() {
        for act in [
            DialogueAct::Backchannel,
            DialogueAct::Greeting,
            DialogueAct::Question,
            DialogueAct::Command,
            DialogueAct::Statement,
        ] {
            let s = act.to_string();
            assert_eq!(s.parse::<DialogueAct>().unwrap(), act);
        }
    }

    #[test]
    fn entity_type_round_trips() {
        for ty in [
            EntityType::Person,
            EntityType::Gpe,
            EntityType::WorkOfArt,
            EntityType::Cardinal,
        ] {
            let s = ty.to_string();
            assert_eq!(s.parse::<EntityType>().unwrap(), ty);
        }
    }

    #[test]
    fn relation_type_is_case_sensitive() {
        let a = RelationType::from("LOCATED_IN");
        let b = RelationType::from("located_in");
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_dialogue_act_is_an_error() {
        assert!("WHISPER".parse::<DialogueAct>().is_err());
    }
}

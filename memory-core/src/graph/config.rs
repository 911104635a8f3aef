use std::collections::HashSet;

use crate::types::RelationType;

/// Per-store configuration for Graph Model semantics that are not fixed by
/// the type system (spec §9, Open Question 2).
///
/// `RelationType` is an open string vocabulary rather than a closed enum, so
/// which predicates are mutually exclusive for a given subject has to be
/// configuration, not a match arm. A backend owns one of these and answers
/// [`crate::graph::GraphStore::is_exclusive`] from it.
#[derive(Debug, Clone)]
pub struct GraphModelConfig {
    exclusive_relation_types: HashSet<RelationType>,
}

impl GraphModelConfig {
    /// An empty exclusive set: every relation type may hold multiple active
    /// values per subject simultaneously.
    #[must_use]
    pub fn new() -> Self {
        Self {
            exclusive_relation_types: HashSet::new(),
        }
    }

    /// Register `relation_type` as exclusive: a subject may have at most one
    /// active relation of this type at a time, so adding a new one triggers
    /// the Invalidator (spec §4.6).
    pub fn with_exclusive(mut self, relation_type: impl Into<RelationType>) -> Self {
        self.exclusive_relation_types.insert(relation_type.into());
        self
    }

    #[must_use]
    pub fn is_exclusive(&self, relation_type: &RelationType) -> bool {
        self.exclusive_relation_types.contains(relation_type)
    }
}

impl Default for GraphModelConfig {
    /// The default exclusive set covers the single-valued relations named in
    /// the spec's glossary example (`LOCATED_IN`): predicates that describe
    /// one current state rather than an accumulating set of facts.
    fn default() -> Self {
        Self::new()
            .with_exclusive("LOCATED_IN")
            .with_exclusive("KIN_OF")
            .with_exclusive("WORKS_AT")
            .with_exclusive("MARRIED_TO")
            .with_exclusive("EMPLOYED_BY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_marks_located_in_exclusive() {
        let cfg = GraphModelConfig::default();
        assert!(cfg.is_exclusive(&RelationType::from("LOCATED_IN")));
    }

    #[test]
    fn default_config_does_not_mark_unknown_types_exclusive() {
        let cfg = GraphModelConfig::default();
        assert!(!cfg.is_exclusive(&RelationType::from("LIKES")));
    }

    #[test]
    fn with_exclusive_extends_the_set() {
        let cfg = GraphModelConfig::new().with_exclusive("LIKES");
        assert!(cfg.is_exclusive(&RelationType::from("LIKES")));
    }
}

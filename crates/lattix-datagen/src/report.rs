//! Non-fatal conditions collected during a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A degraded-but-recoverable outcome.
///
/// Warnings never abort a run; they are logged as they happen and returned
/// in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The splitter could not move enough triples out of train without
    /// stranding an entity. The unplaced quota stayed in train.
    SplitRetriesExhausted {
        relation: String,
        requested: usize,
        placed: usize,
    },

    /// Entities that appear in an evaluation split but never in train.
    ColdStartEntities { split: String, count: usize },

    /// A generator produced fewer negatives than requested.
    NegativesShortfall {
        generator: String,
        split: String,
        relation: String,
        /// Positives that received fewer negatives than requested.
        positives: usize,
        /// Total number of missing negatives.
        missing: usize,
    },

    /// A positive got no negative at all, so the rest of its relation was
    /// skipped for this split.
    RelationRejected {
        generator: String,
        split: String,
        relation: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SplitRetriesExhausted {
                relation,
                requested,
                placed,
            } => write!(
                f,
                "relation {relation}: placed {placed} of {requested} evaluation triples, rest kept in train"
            ),
            Self::ColdStartEntities { split, count } => {
                write!(f, "{split}: {count} entities not present in train")
            }
            Self::NegativesShortfall {
                generator,
                split,
                relation,
                positives,
                missing,
            } => write!(
                f,
                "{generator} on {split}/{relation}: {missing} negatives missing across {positives} positives"
            ),
            Self::RelationRejected {
                generator,
                split,
                relation,
            } => write!(
                f,
                "{generator} on {split}/{relation}: no negatives for a positive, relation skipped"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_with_kind_tag() {
        let w = Warning::ColdStartEntities {
            split: "test".into(),
            count: 3,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"kind\":\"cold_start_entities\""));
        let back: Warning = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}

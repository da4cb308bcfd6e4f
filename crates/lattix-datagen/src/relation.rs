//! Relation labels.
//!
//! Relations are processed one at a time by the filter, the inverse
//! detector and the splitter, always in [`RelationType`] order. Each
//! relation's shuffle draws from the shared run RNG in that order, so a
//! seed reproduces the same splits only because the order is fixed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A relation type (edge label) in a knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationType(pub String);

impl RelationType {
    /// Create a new relation type.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the relation type as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
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

impl AsRef<str> for RelationType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

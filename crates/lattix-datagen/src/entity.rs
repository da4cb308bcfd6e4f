//! Entity identifiers.
//!
//! [`EntityId`] orders by its label. The graph's entity index, the splitter
//! and the candidate pools of the negatives generators are keyed by it in
//! `BTreeMap`s and `BTreeSet`s, so iteration order, and with it every
//! seeded draw and every written file, depends only on the labels and the
//! seed, never on hashing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an entity.
///
/// Entities have no lifecycle of their own: an entity exists exactly as long
/// as some live triple references it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create a new entity ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

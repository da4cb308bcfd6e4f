//! Triple type for knowledge graphs.
//!
//! A triple represents a (relation, source, target) statement, optionally
//! tagged with the type classification of its target.

use crate::{EntityId, Error, RelationType, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag carried by triples whose target is a literal value.
///
/// Triples with this tag are data properties; everything else is treated as
/// an object property.
pub const DATA_PROPERTY_TAG: &str = "literal";

/// A (relation, source, target) triple.
///
/// Two triples are the same fact only if all four fields match, so
/// duplicates collapse under `Eq`/`Hash`.
///
/// # Example
///
/// ```rust
/// use lattix_datagen::Triple;
///
/// let triple = Triple::new("founded_by", "Apple", "Steve Jobs");
/// assert_eq!(triple.relation.as_str(), "founded_by");
/// assert_eq!(triple.source.as_str(), "Apple");
/// assert_eq!(triple.target.as_str(), "Steve Jobs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Relation label.
    pub relation: RelationType,

    /// Source entity.
    pub source: EntityId,

    /// Target entity.
    pub target: EntityId,

    /// Type classification of the target, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
}

impl Triple {
    /// Create a new untyped triple.
    pub fn new(
        relation: impl Into<RelationType>,
        source: impl Into<EntityId>,
        target: impl Into<EntityId>,
    ) -> Self {
        Self {
            relation: relation.into(),
            source: source.into(),
            target: target.into(),
            type_tag: None,
        }
    }

    /// Create a triple, rejecting empty or blank fields.
    pub fn try_new(
        relation: impl Into<RelationType>,
        source: impl Into<EntityId>,
        target: impl Into<EntityId>,
        type_tag: Option<String>,
    ) -> Result<Self> {
        let triple = Self {
            relation: relation.into(),
            source: source.into(),
            target: target.into(),
            type_tag,
        };
        triple.validate()?;
        Ok(triple)
    }

    /// Set the type tag.
    pub fn with_type(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = Some(type_tag.into());
        self
    }

    /// Check that no field is empty.
    pub fn validate(&self) -> Result<()> {
        let blank = |s: &str| s.trim().is_empty();
        if blank(self.relation.as_str()) {
            return Err(Error::InvalidTriple(format!("empty relation in {self}")));
        }
        if blank(self.source.as_str()) {
            return Err(Error::InvalidTriple(format!("empty source in {self}")));
        }
        if blank(self.target.as_str()) {
            return Err(Error::InvalidTriple(format!("empty target in {self}")));
        }
        if self.type_tag.as_deref().is_some_and(blank) {
            return Err(Error::InvalidTriple(format!("empty type tag in {self}")));
        }
        Ok(())
    }

    /// Whether the target is a literal value.
    pub fn is_data_property(&self) -> bool {
        self.type_tag.as_deref() == Some(DATA_PROPERTY_TAG)
    }

    /// Same relation and tag, with the source replaced.
    pub fn with_source(&self, source: EntityId) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }

    /// Same relation and tag, with the target replaced.
    pub fn with_target(&self, target: EntityId) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.relation, self.source, self.target)
    }
}

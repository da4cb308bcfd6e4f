//! Indexed triple store.
//!
//! [`KnowledgeGraph`] owns the triple set for a pipeline run together with a
//! relation index and an entity index. Both indices are updated on every
//! removal, so they never reference a triple that is gone.

use crate::{EntityId, RelationType, Result, Triple};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Position of a triple inside a [`KnowledgeGraph`].
pub type TripleId = usize;

type FactKey = (RelationType, EntityId, EntityId);

#[derive(Debug, Clone, Default)]
struct EntityEntry {
    incident: BTreeSet<TripleId>,
    out_degree: usize,
    in_degree: usize,
}

/// A knowledge graph built from triples.
///
/// # Example
///
/// ```rust
/// use lattix_datagen::{KnowledgeGraph, Triple};
///
/// let kg = KnowledgeGraph::load(vec![
///     Triple::new("founded_by", "Apple", "Steve Jobs"),
///     Triple::new("headquartered_in", "Apple", "Cupertino"),
///     Triple::new("founded_by", "Apple", "Steve Jobs"),
/// ])
/// .unwrap();
///
/// assert_eq!(kg.triple_count(), 2);
/// assert_eq!(kg.entity_count(), 3);
/// assert_eq!(kg.entity_degree(&"Apple".into()), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    /// Triple slots; removed triples leave `None` behind so ids stay stable.
    slots: Vec<Option<Triple>>,

    /// (relation, source, target) -> ids, regardless of type tag.
    facts: HashMap<FactKey, Vec<TripleId>>,

    relation_index: BTreeMap<RelationType, Vec<TripleId>>,

    entity_index: BTreeMap<EntityId, EntityEntry>,

    live: usize,
}

impl KnowledgeGraph {
    /// Create an empty knowledge graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph and its indices from triples in one pass.
    ///
    /// Duplicates are collapsed. Fails on the first triple with an empty
    /// field.
    pub fn load(triples: impl IntoIterator<Item = Triple>) -> Result<Self> {
        let mut kg = Self::new();
        for triple in triples {
            kg.add_triple(triple)?;
        }
        Ok(kg)
    }

    /// Add a triple. Returns `false` if it was already present.
    pub fn add_triple(&mut self, triple: Triple) -> Result<bool> {
        triple.validate()?;

        let key = (
            triple.relation.clone(),
            triple.source.clone(),
            triple.target.clone(),
        );
        if let Some(ids) = self.facts.get(&key) {
            if ids
                .iter()
                .any(|&id| self.slots[id].as_ref().map(|t| &t.type_tag) == Some(&triple.type_tag))
            {
                return Ok(false);
            }
        }

        let id = self.slots.len();
        self.facts.entry(key).or_default().push(id);
        self.relation_index
            .entry(triple.relation.clone())
            .or_default()
            .push(id);

        let source = self.entity_index.entry(triple.source.clone()).or_default();
        source.incident.insert(id);
        source.out_degree += 1;
        let target = self.entity_index.entry(triple.target.clone()).or_default();
        target.incident.insert(id);
        target.in_degree += 1;

        self.slots.push(Some(triple));
        self.live += 1;
        Ok(true)
    }

    /// Remove every triple with the given relation.
    ///
    /// Returns the number of triples removed.
    pub fn remove_relation(&mut self, relation: &RelationType) -> usize {
        let Some(ids) = self.relation_index.remove(relation) else {
            return 0;
        };
        for &id in &ids {
            self.unlink(id);
        }
        ids.len()
    }

    /// Keep only the triples matching `keep`.
    ///
    /// Returns the number of triples removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&Triple) -> bool) -> usize {
        let doomed: Vec<TripleId> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| match slot {
                Some(t) if !keep(t) => Some(id),
                _ => None,
            })
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let doomed_set: HashSet<TripleId> = doomed.iter().copied().collect();
        let mut touched: BTreeSet<RelationType> = BTreeSet::new();
        for &id in &doomed {
            if let Some(t) = &self.slots[id] {
                touched.insert(t.relation.clone());
            }
        }
        for relation in touched {
            if let Some(ids) = self.relation_index.get_mut(&relation) {
                ids.retain(|id| !doomed_set.contains(id));
                if ids.is_empty() {
                    self.relation_index.remove(&relation);
                }
            }
        }
        for &id in &doomed {
            self.unlink(id);
        }
        doomed.len()
    }

    /// Drop a triple from the slots, the fact index and the entity index.
    /// The caller is responsible for the relation index.
    fn unlink(&mut self, id: TripleId) {
        let Some(triple) = self.slots[id].take() else {
            return;
        };
        self.live -= 1;

        let key = (triple.relation, triple.source, triple.target);
        if let Some(ids) = self.facts.get_mut(&key) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.facts.remove(&key);
            }
        }

        let (_, source, target) = key;
        if let Some(entry) = self.entity_index.get_mut(&source) {
            entry.incident.remove(&id);
            entry.out_degree -= 1;
            if entry.incident.is_empty() {
                self.entity_index.remove(&source);
            }
        }
        if let Some(entry) = self.entity_index.get_mut(&target) {
            entry.incident.remove(&id);
            entry.in_degree -= 1;
            if entry.incident.is_empty() {
                self.entity_index.remove(&target);
            }
        }
    }

    /// Number of live triples.
    pub fn triple_count(&self) -> usize {
        self.live
    }

    /// Number of entities referenced by live triples.
    pub fn entity_count(&self) -> usize {
        self.entity_index.len()
    }

    /// Number of relations with at least one triple.
    pub fn relation_type_count(&self) -> usize {
        self.relation_index.len()
    }

    /// Whether the graph has no triples.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Instance count of a relation.
    pub fn relation_count(&self, relation: &RelationType) -> usize {
        self.relation_index.get(relation).map_or(0, Vec::len)
    }

    /// Total degree (in + out) of an entity.
    pub fn entity_degree(&self, entity: &EntityId) -> usize {
        self.entity_index
            .get(entity)
            .map_or(0, |e| e.in_degree + e.out_degree)
    }

    /// Number of triples with the entity as source.
    pub fn out_degree(&self, entity: &EntityId) -> usize {
        self.entity_index.get(entity).map_or(0, |e| e.out_degree)
    }

    /// Number of triples with the entity as target.
    pub fn in_degree(&self, entity: &EntityId) -> usize {
        self.entity_index.get(entity).map_or(0, |e| e.in_degree)
    }

    /// Whether an entity is referenced by any live triple.
    pub fn contains_entity(&self, entity: &EntityId) -> bool {
        self.entity_index.contains_key(entity)
    }

    /// Whether this exact triple (type tag included) is present.
    pub fn contains(&self, triple: &Triple) -> bool {
        let key = (
            triple.relation.clone(),
            triple.source.clone(),
            triple.target.clone(),
        );
        self.facts.get(&key).is_some_and(|ids| {
            ids.iter()
                .any(|&id| self.slots[id].as_ref().map(|t| &t.type_tag) == Some(&triple.type_tag))
        })
    }

    /// Whether some triple states `relation(source, target)`, whatever its tag.
    pub fn contains_fact(&self, relation: &RelationType, source: &EntityId, target: &EntityId) -> bool {
        self.facts
            .contains_key(&(relation.clone(), source.clone(), target.clone()))
    }

    /// Iterate over live triples in insertion order.
    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.slots.iter().flatten()
    }

    /// Iterate over the triples of one relation in insertion order.
    pub fn relation_triples<'a>(
        &'a self,
        relation: &RelationType,
    ) -> impl Iterator<Item = &'a Triple> + 'a {
        self.relation_index
            .get(relation)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.slots[id].as_ref())
    }

    /// Triples incident to an entity, as source or target.
    pub fn entity_triples<'a>(&'a self, entity: &EntityId) -> impl Iterator<Item = &'a Triple> + 'a {
        self.entity_index
            .get(entity)
            .into_iter()
            .flat_map(|e| e.incident.iter())
            .filter_map(move |&id| self.slots[id].as_ref())
    }

    /// Relations in label order.
    pub fn relations(&self) -> impl Iterator<Item = &RelationType> {
        self.relation_index.keys()
    }

    /// Entities in label order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityId> {
        self.entity_index.keys()
    }

    /// Type classification of an entity.
    ///
    /// Taken from the earliest live triple that has the entity as target and
    /// carries a type tag.
    pub fn entity_type(&self, entity: &EntityId) -> Option<&str> {
        self.entity_triples(entity)
            .find(|t| &t.target == entity && t.type_tag.is_some())
            .and_then(|t| t.type_tag.as_deref())
    }

    /// Relation counts, most frequent first (ties by label).
    pub fn relation_frequencies(&self) -> Vec<(&RelationType, usize)> {
        let mut freqs: Vec<_> = self
            .relation_index
            .iter()
            .map(|(r, ids)| (r, ids.len()))
            .collect();
        freqs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        freqs
    }

    /// Entity degrees as `(entity, degree, out_degree, in_degree)`, highest
    /// degree first (ties by label).
    pub fn entity_degrees(&self) -> Vec<(&EntityId, usize, usize, usize)> {
        let mut degrees: Vec<_> = self
            .entity_index
            .iter()
            .map(|(e, d)| (e, d.in_degree + d.out_degree, d.out_degree, d.in_degree))
            .collect();
        degrees.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        degrees
    }

    /// Directed petgraph view of the live triples.
    ///
    /// Nodes are added in entity label order, edges in triple order.
    pub fn to_petgraph(&self) -> DiGraph<EntityId, RelationType> {
        let mut graph = DiGraph::with_capacity(self.entity_count(), self.triple_count());
        let mut nodes: HashMap<&EntityId, NodeIndex> = HashMap::with_capacity(self.entity_count());
        for entity in self.entities() {
            nodes.insert(entity, graph.add_node(entity.clone()));
        }
        for t in self.triples() {
            graph.add_edge(nodes[&t.source], nodes[&t.target], t.relation.clone());
        }
        graph
    }

    /// Compute statistics about the graph.
    pub fn stats(&self) -> KnowledgeGraphStats {
        let entity_count = self.entity_count();
        let triple_count = self.triple_count();
        let avg_degree = if entity_count > 0 {
            2.0 * triple_count as f64 / entity_count as f64
        } else {
            0.0
        };
        KnowledgeGraphStats {
            entity_count,
            triple_count,
            relation_type_count: self.relation_type_count(),
            avg_degree,
            weak_components: petgraph::algo::connected_components(&self.to_petgraph()),
        }
    }
}

/// Statistics about a knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraphStats {
    /// Number of entities.
    pub entity_count: usize,
    /// Number of triples.
    pub triple_count: usize,
    /// Number of relations.
    pub relation_type_count: usize,
    /// Average total degree.
    pub avg_degree: f64,
    /// Weakly connected components.
    pub weak_components: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KnowledgeGraph {
        KnowledgeGraph::load(vec![
            Triple::new("r1", "A", "B"),
            Triple::new("r1", "B", "C"),
            Triple::new("r2", "A", "C"),
            Triple::new("r2", "C", "D"),
            Triple::new("r3", "D", "E"),
        ])
        .unwrap()
    }

    #[test]
    fn test_load_collapses_duplicates() {
        let kg = KnowledgeGraph::load(vec![
            Triple::new("r", "a", "b"),
            Triple::new("r", "a", "b"),
            Triple::new("r", "a", "b").with_type("T"),
        ])
        .unwrap();
        assert_eq!(kg.triple_count(), 2);
        assert_eq!(kg.relation_count(&"r".into()), 2);
        assert!(kg.contains_fact(&"r".into(), &"a".into(), &"b".into()));
    }

    #[test]
    fn test_load_rejects_empty_field() {
        let err = KnowledgeGraph::load(vec![Triple::new("r", "a", "")]).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidTriple(_)));
    }

    #[test]
    fn test_degrees_and_counts() {
        let kg = sample();
        assert_eq!(kg.entity_count(), 5);
        assert_eq!(kg.relation_count(&"r1".into()), 2);
        assert_eq!(kg.entity_degree(&"C".into()), 3);
        assert_eq!(kg.in_degree(&"C".into()), 2);
        assert_eq!(kg.out_degree(&"C".into()), 1);
        assert_eq!(kg.entity_degree(&"missing".into()), 0);
    }

    #[test]
    fn test_remove_relation_updates_indices() {
        let mut kg = sample();
        let removed = kg.remove_relation(&"r3".into());
        assert_eq!(removed, 1);
        assert_eq!(kg.triple_count(), 4);
        assert_eq!(kg.relation_count(&"r3".into()), 0);
        // E only appeared in r3.
        assert!(!kg.contains_entity(&"E".into()));
        assert_eq!(kg.entity_degree(&"D".into()), 1);
        assert_eq!(kg.relations().count(), 2);
        assert_eq!(kg.remove_relation(&"r3".into()), 0);
    }

    #[test]
    fn test_retain_updates_indices() {
        let mut kg = sample();
        let removed = kg.retain(|t| t.source.as_str() != "A");
        assert_eq!(removed, 2);
        assert!(!kg.contains_entity(&"A".into()));
        assert_eq!(kg.relation_count(&"r1".into()), 1);
        assert_eq!(kg.relation_count(&"r2".into()), 1);
        assert_eq!(kg.entity_triples(&"C".into()).count(), 2);
    }

    #[test]
    fn test_entity_type_follows_live_triples() {
        let mut kg = KnowledgeGraph::load(vec![
            Triple::new("bornIn", "Alice", "Paris").with_type("City"),
            Triple::new("name", "Alice", "Paris").with_type("literal"),
        ])
        .unwrap();
        assert_eq!(kg.entity_type(&"Paris".into()), Some("City"));
        assert_eq!(kg.entity_type(&"Alice".into()), None);
        kg.remove_relation(&"bornIn".into());
        assert_eq!(kg.entity_type(&"Paris".into()), Some("literal"));
    }

    #[test]
    fn test_frequencies_sorted() {
        let kg = sample();
        let freqs = kg.relation_frequencies();
        assert_eq!(freqs[0].1, 2);
        assert_eq!(freqs[0].0.as_str(), "r1");
        assert_eq!(freqs[2].0.as_str(), "r3");
    }

    #[test]
    fn test_stats() {
        let mut kg = sample();
        kg.add_triple(Triple::new("r4", "X", "Y")).unwrap();
        let stats = kg.stats();
        assert_eq!(stats.entity_count, 7);
        assert_eq!(stats.triple_count, 6);
        assert_eq!(stats.relation_type_count, 4);
        assert_eq!(stats.weak_components, 2);
    }
}

//! Inverse relation detection.
//!
//! Two relations r1, r2 are inverses when most (s, t) pairs of r1 appear
//! as (t, s) in r2. The overlap score is normalised by the smaller relation:
//!
//! ```text
//! score(r1, r2) = |{(s, t) ∈ r1 : (t, s) ∈ r2}| / min(|r1|, |r2|)
//! ```
//!
//! The numerator is symmetric (map each match (s, t) to (t, s)), so the
//! score is too. Relation sizes count distinct (source, target) pairs.
//!
//! # Complexity
//!
//! Candidate pairs come from a reversed-pair index, so only relations that
//! share at least one reversed pair are ever compared. The worst case is
//! still O(R²·T̄) for R relations of average size T̄, which is fine for
//! graphs with tens of thousands of triples and hundreds of relations but
//! is the scaling limit of this stage.

use crate::{EntityId, KnowledgeGraph, RelationType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// A detected inverse pair, `first < second` by label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversePair {
    pub first: RelationType,
    pub second: RelationType,
    pub score: f64,
}

/// Outcome of [`detect_and_remove`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InverseReport {
    /// Every pair at or above the threshold, strongest first.
    pub pairs: Vec<InversePair>,
    /// Relations removed, in removal order.
    pub removed: Vec<RelationType>,
}

type Pair<'a> = (&'a EntityId, &'a EntityId);

fn pair_set<'a>(graph: &'a KnowledgeGraph, relation: &RelationType) -> HashSet<Pair<'a>> {
    graph
        .relation_triples(relation)
        .map(|t| (&t.source, &t.target))
        .collect()
}

/// Overlap score between two relations.
///
/// Returns 0.0 when the relations are equal or either is empty.
pub fn overlap_score(graph: &KnowledgeGraph, r1: &RelationType, r2: &RelationType) -> f64 {
    if r1 == r2 {
        return 0.0;
    }
    let a = pair_set(graph, r1);
    let b = pair_set(graph, r2);
    let denom = a.len().min(b.len());
    if denom == 0 {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let matches = small.iter().filter(|(s, t)| large.contains(&(*t, *s))).count();
    matches as f64 / denom as f64
}

/// Score every relation pair sharing a reversed pair and return those with
/// `score >= threshold`, strongest first (ties by labels).
///
/// Pairs without a single reversed match are never reported, even for a
/// threshold of 0.
pub fn find_inverses(graph: &KnowledgeGraph, threshold: f64) -> Vec<InversePair> {
    let relations: Vec<&RelationType> = graph.relations().collect();
    let sets: Vec<HashSet<Pair<'_>>> = relations.iter().map(|r| pair_set(graph, r)).collect();

    let mut holders: HashMap<Pair<'_>, Vec<usize>> = HashMap::new();
    for (i, set) in sets.iter().enumerate() {
        for &pair in set {
            holders.entry(pair).or_default().push(i);
        }
    }

    // Count each match once, from the lower-indexed relation's side.
    let mut matches: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for (i, set) in sets.iter().enumerate() {
        for (s, t) in set {
            if let Some(js) = holders.get(&(*t, *s)) {
                for &j in js.iter().filter(|&&j| j > i) {
                    *matches.entry((i, j)).or_default() += 1;
                }
            }
        }
    }

    let mut pairs: Vec<InversePair> = matches
        .into_iter()
        .filter_map(|((i, j), m)| {
            let denom = sets[i].len().min(sets[j].len());
            let score = m as f64 / denom as f64;
            (score >= threshold).then(|| InversePair {
                first: relations[i].clone(),
                second: relations[j].clone(),
                score,
            })
        })
        .collect();

    pairs.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.first.cmp(&b.first))
            .then_with(|| a.second.cmp(&b.second))
    });
    pairs
}

/// Detect inverse pairs and remove one relation of each.
///
/// Pairs are resolved strongest first. The relation with fewer triples is
/// dropped; on a tie the lexicographically greater label goes. Pairs with a
/// member that is already gone are skipped, so no relation is removed twice
/// and a second run finds nothing left to remove.
pub fn detect_and_remove(graph: &mut KnowledgeGraph, threshold: f64) -> InverseReport {
    let pairs = find_inverses(graph, threshold);
    let mut removed: Vec<RelationType> = Vec::new();

    for pair in &pairs {
        if removed.contains(&pair.first) || removed.contains(&pair.second) {
            continue;
        }
        let c1 = graph.relation_count(&pair.first);
        let c2 = graph.relation_count(&pair.second);
        let (loser, kept) = if c1 < c2 {
            (&pair.first, &pair.second)
        } else {
            (&pair.second, &pair.first)
        };
        let n = graph.remove_relation(loser);
        debug!(
            %kept,
            removed = %loser,
            score = pair.score,
            triples = n,
            "removed inverse relation"
        );
        removed.push(loser.clone());
    }

    info!(
        pairs = pairs.len(),
        removed = removed.len(),
        threshold,
        "resolved inverse relations"
    );
    InverseReport { pairs, removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Triple;

    fn inverse_graph() -> KnowledgeGraph {
        let mut triples = Vec::new();
        for i in 0..10 {
            triples.push(Triple::new("parentOf", format!("p{i}"), format!("c{i}")));
            triples.push(Triple::new("childOf", format!("c{i}"), format!("p{i}")));
        }
        // One extra childOf so the counts differ.
        triples.push(Triple::new("childOf", "c0", "p9"));
        triples.push(Triple::new("livesIn", "p0", "city"));
        KnowledgeGraph::load(triples).unwrap()
    }

    #[test]
    fn test_score_full_overlap() {
        let kg = inverse_graph();
        let s = overlap_score(&kg, &"parentOf".into(), &"childOf".into());
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_symmetric() {
        let kg = inverse_graph();
        let a = overlap_score(&kg, &"parentOf".into(), &"childOf".into());
        let b = overlap_score(&kg, &"childOf".into(), &"parentOf".into());
        assert_eq!(a, b);
        assert_eq!(overlap_score(&kg, &"livesIn".into(), &"childOf".into()), 0.0);
        assert_eq!(overlap_score(&kg, &"livesIn".into(), &"livesIn".into()), 0.0);
    }

    #[test]
    fn test_partial_overlap_uses_smaller_cardinality() {
        let kg = KnowledgeGraph::load(vec![
            Triple::new("a", "x", "y"),
            Triple::new("a", "y", "z"),
            Triple::new("b", "y", "x"),
            Triple::new("b", "q", "w"),
            Triple::new("b", "w", "e"),
            Triple::new("b", "e", "r"),
        ])
        .unwrap();
        // One match, min(2, 4) = 2.
        let s = overlap_score(&kg, &"a".into(), &"b".into());
        assert!((s - 0.5).abs() < 1e-12);
        let found = find_inverses(&kg, 0.5);
        assert_eq!(found.len(), 1);
        assert!((found[0].score - 0.5).abs() < 1e-12);
        assert!(find_inverses(&kg, 0.6).is_empty());
    }

    #[test]
    fn test_removes_smaller_relation() {
        let mut kg = inverse_graph();
        let report = detect_and_remove(&mut kg, 0.9);
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.removed, vec![RelationType::from("parentOf")]);
        assert_eq!(kg.relation_count(&"parentOf".into()), 0);
        assert_eq!(kg.relation_count(&"childOf".into()), 11);
    }

    #[test]
    fn test_tie_removes_greater_label() {
        let mut kg = KnowledgeGraph::load(vec![
            Triple::new("r2", "a", "b"),
            Triple::new("r1", "b", "a"),
        ])
        .unwrap();
        let report = detect_and_remove(&mut kg, 1.0);
        assert_eq!(report.removed, vec![RelationType::from("r2")]);
        assert_eq!(kg.relation_count(&"r1".into()), 1);
    }

    #[test]
    fn test_chain_removes_each_relation_once() {
        // r1, r2 and r3 are all mutual inverses of each other's reversal.
        let mut kg = KnowledgeGraph::load(vec![
            Triple::new("r1", "a", "b"),
            Triple::new("r1", "c", "d"),
            Triple::new("r2", "b", "a"),
            Triple::new("r2", "d", "c"),
            Triple::new("r3", "b", "a"),
            Triple::new("r3", "d", "c"),
        ])
        .unwrap();
        let report = detect_and_remove(&mut kg, 0.9);
        assert_eq!(report.pairs.len(), 2);
        // (r1, r2) first: tie, r2 goes. (r1, r3): tie, r3 goes.
        assert_eq!(
            report.removed,
            vec![RelationType::from("r2"), RelationType::from("r3")]
        );
        assert_eq!(kg.relation_type_count(), 1);
    }

    #[test]
    fn test_idempotent() {
        let mut kg = inverse_graph();
        detect_and_remove(&mut kg, 0.9);
        let before = kg.triple_count();
        let second = detect_and_remove(&mut kg, 0.9);
        assert!(second.removed.is_empty());
        assert_eq!(kg.triple_count(), before);
    }
}

//! Relation pruning.
//!
//! Counts are read once before anything is removed, so the outcome depends
//! only on the graph as it was when the filter started.

use crate::{KnowledgeGraph, RelationType};
use tracing::{debug, info};

/// Remove every relation with fewer than `min_num_rel` triples.
///
/// Returns the removed relations in label order. `min_num_rel == 0` removes
/// nothing.
pub fn filter(graph: &mut KnowledgeGraph, min_num_rel: usize) -> Vec<RelationType> {
    if min_num_rel == 0 {
        return Vec::new();
    }
    let doomed: Vec<RelationType> = graph
        .relations()
        .filter(|r| graph.relation_count(r) < min_num_rel)
        .cloned()
        .collect();
    remove_all(graph, &doomed);
    info!(
        removed = doomed.len(),
        kept = graph.relation_type_count(),
        min_num_rel,
        "pruned infrequent relations"
    );
    doomed
}

/// Keep the most frequent relations until they cover `coverage` of all
/// triples, and remove the rest.
///
/// Relations are accumulated by count (descending, ties by label); the
/// relation that crosses the threshold is kept. `coverage >= 1.0` removes
/// nothing.
pub fn filter_by_coverage(graph: &mut KnowledgeGraph, coverage: f64) -> Vec<RelationType> {
    if coverage >= 1.0 || graph.is_empty() {
        return Vec::new();
    }
    let total = graph.triple_count() as f64;
    let mut accumulated = 0.0;
    let mut doomed = Vec::new();
    for (relation, count) in graph.relation_frequencies() {
        if accumulated >= coverage {
            doomed.push(relation.clone());
        } else {
            accumulated += count as f64 / total;
        }
    }
    doomed.sort();
    remove_all(graph, &doomed);
    info!(
        removed = doomed.len(),
        kept = graph.relation_type_count(),
        coverage,
        "pruned relations outside coverage"
    );
    doomed
}

fn remove_all(graph: &mut KnowledgeGraph, relations: &[RelationType]) {
    for relation in relations {
        let n = graph.remove_relation(relation);
        debug!(%relation, triples = n, "removed relation");
    }
}

//! Negative example generation.
//!
//! A negative is a triple believed to be false, used to check that a
//! link-prediction model tells true facts apart from plausible-looking
//! corruptions.
//!
//! Strategies implement [`NegativesGenerator`]. A [`NegativesPlan`] holds
//! the configured generators in order, each with a [`NegativeCount`], and
//! runs them over the positives of a split:
//!
//! 1. [`NegativesPlan::initialize`] calls every generator's `initialize`
//!    once with the final graph and splits.
//! 2. [`NegativesPlan::generate`] calls `generate_negatives` for every
//!    positive and generator, in parallel across positives.
//! 3. Per positive, negatives that state a known fact or repeat an earlier
//!    negative are dropped.
//!
//! Counts may be fractional: `2.3` asks for two negatives per positive,
//! plus a third with probability 0.3.
//!
//! Each positive gets its own random stream derived from the run RNG, so
//! the output is the same whatever the thread count.
//!
//! # Example
//!
//! ```rust
//! use lattix_datagen::negatives::{
//!     Corrupt, GenerationContext, NegativeCount, NegativesPlan, RandomCorruption,
//! };
//! use lattix_datagen::sampling::seeded_rng;
//! use lattix_datagen::{KnowledgeGraph, SplitKind, Splits, Triple};
//!
//! let kg = KnowledgeGraph::load(vec![
//!     Triple::new("likes", "a", "b"),
//!     Triple::new("likes", "b", "c"),
//!     Triple::new("likes", "c", "d"),
//! ])
//! .unwrap();
//! let splits = Splits::default();
//!
//! let mut plan = NegativesPlan::new();
//! plan.push(RandomCorruption::new(Corrupt::Target), NegativeCount::new(1));
//! plan.initialize(&GenerationContext::new(&kg, &splits)).unwrap();
//!
//! let positives: Vec<Triple> = kg.triples().cloned().collect();
//! let mut rng = seeded_rng(42);
//! let out = plan.generate(&kg, SplitKind::Test, &positives, &mut rng).unwrap();
//! assert_eq!(out.negatives.len(), 3);
//! ```

mod random;

pub use random::{strategy_name, CandidatePool, Corrupt, RandomCorruption, StrategySpec};

use crate::report::Warning;
use crate::sampling::{child_rng, DatasetRng};
use crate::{Error, KnowledgeGraph, RelationType, Result, SplitKind, Splits, Triple};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::{info, warn};

/// What a generator may look at while preparing itself.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    /// The filtered graph; every triple in it counts as a known positive.
    pub graph: &'a KnowledgeGraph,
    /// The final splits, before any negatives are attached.
    pub splits: &'a Splits,
    /// Restrict replacements to entities of the same type classification.
    pub separate_types: bool,
}

impl<'a> GenerationContext<'a> {
    pub fn new(graph: &'a KnowledgeGraph, splits: &'a Splits) -> Self {
        Self {
            graph,
            splits,
            separate_types: false,
        }
    }

    pub fn with_separate_types(mut self, separate_types: bool) -> Self {
        self.separate_types = separate_types;
        self
    }
}

/// A negative sampling strategy.
///
/// `initialize` runs once, before any call to `generate_negatives`, and is
/// the place to precompute candidate pools. `generate_negatives` may be
/// called concurrently from several threads and must not rely on call
/// order.
///
/// An error from either method aborts the run.
pub trait NegativesGenerator: Send + Sync {
    /// Short name used in logs and warnings.
    fn name(&self) -> &str;

    /// Prepare the generator for the given graph and splits.
    fn initialize(&mut self, _ctx: &GenerationContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Produce up to `count` negatives for `positive`.
    fn generate_negatives(
        &self,
        positive: &Triple,
        count: usize,
        rng: &mut DatasetRng,
    ) -> Result<Vec<Triple>>;

    /// Whether identical negatives from this generator for the same positive
    /// are all kept. Negatives stating known facts are dropped regardless.
    fn keeps_duplicates(&self) -> bool {
        false
    }
}

/// Negatives per positive, optionally overridden for some relations.
///
/// The whole part of a count is always requested; the fractional part is
/// the probability of requesting one more.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NegativeCount {
    pub default: f64,
    #[serde(default)]
    pub per_relation: BTreeMap<RelationType, f64>,
}

impl NegativeCount {
    pub fn new(default: impl Into<f64>) -> Self {
        Self {
            default: default.into(),
            per_relation: BTreeMap::new(),
        }
    }

    /// Override the count for one relation.
    pub fn with_relation(mut self, relation: impl Into<RelationType>, count: impl Into<f64>) -> Self {
        self.per_relation.insert(relation.into(), count.into());
        self
    }

    pub fn for_relation(&self, relation: &RelationType) -> f64 {
        self.per_relation
            .get(relation)
            .copied()
            .unwrap_or(self.default)
    }

    /// Number of negatives to request for one positive of `relation`.
    ///
    /// Only consumes randomness when the count has a fractional part.
    /// Negative or NaN counts request nothing.
    pub fn draw(&self, relation: &RelationType, rng: &mut DatasetRng) -> usize {
        let count = self.for_relation(relation);
        if !(count > 0.0) {
            return 0;
        }
        let whole = count.floor();
        let extra = count - whole;
        let bonus = usize::from(extra > 0.0 && rng.gen::<f64>() < extra);
        whole as usize + bonus
    }

    /// Whether every count is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        std::iter::once(&self.default)
            .chain(self.per_relation.values())
            .all(|c| c.is_finite() && *c >= 0.0)
    }
}

impl From<usize> for NegativeCount {
    fn from(default: usize) -> Self {
        Self::new(default as f64)
    }
}

impl From<f64> for NegativeCount {
    fn from(default: f64) -> Self {
        Self::new(default)
    }
}

struct PlanEntry {
    generator: Box<dyn NegativesGenerator>,
    count: NegativeCount,
}

/// Ordered set of generators with their counts.
#[derive(Default)]
pub struct NegativesPlan {
    entries: Vec<PlanEntry>,
    initialized: bool,
    reject_relation_after_failure: bool,
}

impl fmt::Debug for NegativesPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegativesPlan")
            .field(
                "generators",
                &self
                    .entries
                    .iter()
                    .map(|e| (e.generator.name(), &e.count))
                    .collect::<Vec<_>>(),
            )
            .field("initialized", &self.initialized)
            .field("reject_relation_after_failure", &self.reject_relation_after_failure)
            .finish()
    }
}

/// Negatives produced for one split.
#[derive(Debug, Clone, Default)]
pub struct NegativesOutcome {
    pub negatives: Vec<Triple>,
    pub requested: usize,
    pub warnings: Vec<Warning>,
}

impl NegativesPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a generator. Generators run in the order they were added.
    pub fn push(&mut self, generator: impl NegativesGenerator + 'static, count: impl Into<NegativeCount>) {
        self.push_boxed(Box::new(generator), count.into());
    }

    pub fn push_boxed(&mut self, generator: Box<dyn NegativesGenerator>, count: NegativeCount) {
        self.entries.push(PlanEntry { generator, count });
        self.initialized = false;
    }

    /// Stop generating for a relation once one of its positives gets no
    /// negative at all from a generator.
    ///
    /// Positives are visited in order; the first positive that comes back
    /// empty rules out its relation for the rest of the split, across all
    /// later generators. Such relations usually have a single candidate.
    pub fn with_reject_relation_after_failure(mut self, reject: bool) -> Self {
        self.reject_relation_after_failure = reject;
        self
    }

    pub fn set_reject_relation_after_failure(&mut self, reject: bool) {
        self.reject_relation_after_failure = reject;
    }

    pub fn rejects_relation_after_failure(&self) -> bool {
        self.reject_relation_after_failure
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Generator names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.generator.name()).collect()
    }

    /// Run every generator's `initialize` hook.
    ///
    /// Hooks run once; later calls are no-ops until another generator is
    /// added.
    pub fn initialize(&mut self, ctx: &GenerationContext<'_>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        for entry in &mut self.entries {
            let name = entry.generator.name().to_string();
            entry.generator.initialize(ctx).map_err(|e| match e {
                err @ Error::Generator { .. } => err,
                other => Error::Generator {
                    generator: name,
                    triple: "<initialize>".into(),
                    message: other.to_string(),
                },
            })?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Generate negatives for `positives`.
    ///
    /// `graph` is the set of known positives; no emitted negative states a
    /// fact in it. Output is grouped by positive, in positive order, and
    /// within a positive by generator order.
    pub fn generate(
        &self,
        graph: &KnowledgeGraph,
        split: SplitKind,
        positives: &[Triple],
        rng: &mut DatasetRng,
    ) -> Result<NegativesOutcome> {
        if !self.initialized && !self.entries.is_empty() {
            return Err(Error::Generator {
                generator: self.names().join(","),
                triple: "<plan>".into(),
                message: "generate called before initialize".into(),
            });
        }

        let mut per_positive: Vec<Vec<Triple>> = vec![Vec::new(); positives.len()];
        let mut seen: Vec<HashSet<Triple>> = vec![HashSet::new(); positives.len()];
        let mut requested = 0;
        let mut warnings = Vec::new();
        let mut rejected: BTreeSet<RelationType> = BTreeSet::new();

        for entry in &self.entries {
            let generator = entry.generator.as_ref();
            let name = generator.name();
            let seed: u64 = rng.gen();

            let batches: Vec<(usize, Vec<Triple>)> = positives
                .par_iter()
                .enumerate()
                .map(|(i, positive)| {
                    if rejected.contains(&positive.relation) {
                        return Ok((0, Vec::new()));
                    }
                    let mut local = child_rng(seed, i);
                    let count = entry.count.draw(&positive.relation, &mut local);
                    if count == 0 {
                        return Ok((0, Vec::new()));
                    }
                    generator
                        .generate_negatives(positive, count, &mut local)
                        .map(|batch| (count, batch))
                        .map_err(|e| Error::Generator {
                            generator: name.to_string(),
                            triple: positive.to_string(),
                            message: e.to_string(),
                        })
                })
                .collect::<Result<_>>()?;

            let mut shortfalls: BTreeMap<&RelationType, (usize, usize)> = BTreeMap::new();
            for (i, (count, batch)) in batches.into_iter().enumerate() {
                let positive = &positives[i];
                if count == 0 || rejected.contains(&positive.relation) {
                    continue;
                }
                requested += count;

                let mut own: HashSet<Triple> = HashSet::new();
                let mut accepted = 0;
                for negative in batch {
                    if accepted == count {
                        break;
                    }
                    if graph.contains_fact(&negative.relation, &negative.source, &negative.target)
                        || seen[i].contains(&negative)
                    {
                        continue;
                    }
                    if !own.insert(negative.clone()) && !generator.keeps_duplicates() {
                        continue;
                    }
                    per_positive[i].push(negative);
                    accepted += 1;
                }
                seen[i].extend(own);

                if accepted < count {
                    let slot = shortfalls.entry(&positive.relation).or_default();
                    slot.0 += 1;
                    slot.1 += count - accepted;
                }
                if accepted == 0 && self.reject_relation_after_failure {
                    let w = Warning::RelationRejected {
                        generator: name.to_string(),
                        split: split.to_string(),
                        relation: positive.relation.to_string(),
                    };
                    warn!("{w}");
                    warnings.push(w);
                    rejected.insert(positive.relation.clone());
                }
            }

            for (relation, (short, missing)) in shortfalls {
                let w = Warning::NegativesShortfall {
                    generator: name.to_string(),
                    split: split.to_string(),
                    relation: relation.to_string(),
                    positives: short,
                    missing,
                };
                warn!("{w}");
                warnings.push(w);
            }
        }

        let negatives: Vec<Triple> = per_positive.into_iter().flatten().collect();
        info!(
            %split,
            positives = positives.len(),
            requested,
            produced = negatives.len(),
            "generated negatives"
        );
        Ok(NegativesOutcome {
            negatives,
            requested,
            warnings,
        })
    }
}

//! Train / test / validation partitioning.
//!
//! Splitting happens per relation so that every relation keeps the
//! requested proportions. Two techniques are available:
//!
//! | Technique | Selection | Guarantee |
//! |-----------|-----------|-----------|
//! | `Random` | uniform per relation | exact quotas |
//! | `Reachability` | uniform, skipping candidates that would strand an entity | every evaluation entity keeps a train edge |
//!
//! The reachability technique also caps how much of an entity's
//! neighbourhood may leave train: at most `floor(reach_fraction · degree)`
//! of its edges. Entities with a degree of 1 are therefore never split.
//!
//! With `number_splits = n > 1`, [`Splitter::split_folds`] produces `n`
//! rotated splits. Each relation is shuffled once; split `k` starts picking
//! evaluation triples at offset `floor(len · k / n)` of that order and wraps
//! around, so consecutive splits hold mostly different test triples.

use crate::report::Warning;
use crate::sampling::{sample_sorted, DatasetRng};
use crate::{EntityId, Error, KnowledgeGraph, RelationType, Result, Triple};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How evaluation triples are picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitTechnique {
    /// Uniform selection per relation.
    Random,
    /// Uniform selection that never isolates an entity from train.
    #[default]
    Reachability,
}

impl FromStr for SplitTechnique {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "reachability" | "reachable" => Ok(Self::Reachability),
            other => Err(Error::config(format!("unknown splitting technique: {other}"))),
        }
    }
}

impl fmt::Display for SplitTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Reachability => write!(f, "reachability"),
        }
    }
}

/// What to do with entities that end up only in test or validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColdStartPolicy {
    /// Fail the run.
    #[default]
    Forbid,
    /// Keep them and report a warning.
    Allow,
}

/// One of the three output splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Test,
    Validation,
}

impl SplitKind {
    /// Name used for output files.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
            Self::Validation => "valid",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// Positives of a split and the negatives generated for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitSet {
    /// Graph triples assigned to this split, in graph order.
    pub positives: Vec<Triple>,
    /// Negatives generated for `positives`, grouped by positive. Empty when
    /// the split was not passed through negative generation.
    pub negatives: Vec<Triple>,
}

impl SplitSet {
    /// Entities referenced by the positives.
    pub fn entities(&self) -> BTreeSet<&EntityId> {
        self.positives
            .iter()
            .flat_map(|t| [&t.source, &t.target])
            .collect()
    }
}

/// The three disjoint splits of a graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Splits {
    pub train: SplitSet,
    pub test: SplitSet,
    pub validation: SplitSet,
}

impl Splits {
    /// The split of the given kind.
    pub fn get(&self, kind: SplitKind) -> &SplitSet {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Test => &self.test,
            SplitKind::Validation => &self.validation,
        }
    }

    /// Mutable access, used to attach negatives after splitting.
    pub fn get_mut(&mut self, kind: SplitKind) -> &mut SplitSet {
        match kind {
            SplitKind::Train => &mut self.train,
            SplitKind::Test => &mut self.test,
            SplitKind::Validation => &mut self.validation,
        }
    }

    /// Total number of positives across splits.
    pub fn positive_count(&self) -> usize {
        self.train.positives.len() + self.test.positives.len() + self.validation.positives.len()
    }
}

/// Splitter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Fraction of each relation placed in test.
    pub test_fraction: f64,
    /// Fraction of each relation placed in validation.
    pub validation_fraction: f64,
    /// Fraction of the graph kept before splitting.
    pub graph_fraction: f64,
    /// Largest share of an entity's edges that may leave train.
    pub reach_fraction: f64,
    pub technique: SplitTechnique,
    /// Consecutive rejected candidates tolerated per relation.
    pub max_retries: usize,
    pub cold_start: ColdStartPolicy,
    /// Rotated splits produced by [`Splitter::split_folds`]. At least 1.
    pub number_splits: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            validation_fraction: 0.0,
            graph_fraction: 1.0,
            reach_fraction: 1.0,
            technique: SplitTechnique::default(),
            max_retries: 100,
            cold_start: ColdStartPolicy::default(),
            number_splits: 1,
        }
    }
}

/// Result of [`Splitter::split`], or one entry of [`Splitter::split_folds`].
#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub splits: Splits,
    pub warnings: Vec<Warning>,
    /// Triples left out by graph subsampling.
    pub dropped: usize,
}

/// Per-relation graph partitioner.
#[derive(Debug, Clone, Default)]
pub struct Splitter {
    options: SplitOptions,
}

/// Subsampled triples with each relation's shuffled candidate order.
struct Order<'g> {
    working: Vec<&'g Triple>,
    by_relation: BTreeMap<&'g RelationType, Vec<usize>>,
    dropped: usize,
}

/// Train-side bookkeeping for the reachability technique.
struct Reach<'a> {
    degree: HashMap<&'a EntityId, usize>,
    in_train: HashMap<&'a EntityId, usize>,
    reach_fraction: f64,
}

impl<'a> Reach<'a> {
    fn new(triples: &[&'a Triple], reach_fraction: f64) -> Self {
        let mut degree: HashMap<&EntityId, usize> = HashMap::new();
        for t in triples {
            *degree.entry(&t.source).or_default() += 1;
            *degree.entry(&t.target).or_default() += 1;
        }
        Self {
            in_train: degree.clone(),
            degree,
            reach_fraction,
        }
    }

    fn demand(t: &'a Triple) -> Vec<(&'a EntityId, usize)> {
        if t.source == t.target {
            vec![(&t.source, 2)]
        } else {
            vec![(&t.source, 1), (&t.target, 1)]
        }
    }

    /// Whether `t` can leave train without stranding an endpoint.
    fn allows(&self, t: &'a Triple) -> bool {
        Self::demand(t).into_iter().all(|(e, need)| {
            let degree = self.degree[e];
            let left = self.in_train[e];
            let pulled = degree - left;
            let budget = (self.reach_fraction * degree as f64).floor() as usize;
            left > need && pulled + need <= budget
        })
    }

    fn take(&mut self, t: &'a Triple) {
        for (e, need) in Self::demand(t) {
            if let Some(left) = self.in_train.get_mut(e) {
                *left -= need;
            }
        }
    }
}

impl Splitter {
    /// A splitter with the given options. Options are validated by
    /// [`DatasetConfigBuilder::build`](crate::DatasetConfigBuilder::build).
    pub fn new(options: SplitOptions) -> Self {
        Self { options }
    }

    /// The options this splitter was built with.
    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    /// Partition `graph` into train, test and validation positives.
    ///
    /// Every triple kept after subsampling lands in exactly one split.
    pub fn split(&self, graph: &KnowledgeGraph, rng: &mut DatasetRng) -> Result<SplitOutcome> {
        let order = self.prepare(graph, rng);
        self.fold(&order, 0, 1)
    }

    /// Produce `number_splits` rotated partitions of `graph`.
    ///
    /// The first entry equals what [`Splitter::split`] returns for the same
    /// seed. Subsampling and shuffling happen once, so every partition
    /// covers the same triples.
    pub fn split_folds(
        &self,
        graph: &KnowledgeGraph,
        rng: &mut DatasetRng,
    ) -> Result<Vec<SplitOutcome>> {
        let n = self.options.number_splits.max(1);
        let order = self.prepare(graph, rng);
        (0..n).map(|k| self.fold(&order, k, n)).collect()
    }

    /// Subsample, then shuffle each relation's triples.
    fn prepare<'g>(&self, graph: &'g KnowledgeGraph, rng: &mut DatasetRng) -> Order<'g> {
        let opts = &self.options;
        let all: Vec<&Triple> = graph.triples().collect();

        let working: Vec<&Triple> = if opts.graph_fraction < 1.0 {
            let keep = (all.len() as f64 * opts.graph_fraction).round() as usize;
            sample_sorted(rng, all.len(), keep)
                .into_iter()
                .map(|i| all[i])
                .collect()
        } else {
            all
        };
        let dropped = graph.triple_count() - working.len();

        let mut by_relation: BTreeMap<&RelationType, Vec<usize>> = BTreeMap::new();
        for (i, t) in working.iter().enumerate() {
            by_relation.entry(&t.relation).or_default().push(i);
        }
        for ids in by_relation.values_mut() {
            ids.shuffle(rng);
        }

        Order {
            working,
            by_relation,
            dropped,
        }
    }

    /// Assign evaluation triples for split `k` of `n`.
    fn fold(&self, order: &Order<'_>, k: usize, n: usize) -> Result<SplitOutcome> {
        let opts = &self.options;
        let working = &order.working;

        let mut assignment = vec![SplitKind::Train; working.len()];
        let mut reach = match opts.technique {
            SplitTechnique::Reachability => Some(Reach::new(working, opts.reach_fraction)),
            SplitTechnique::Random => None,
        };
        let mut warnings = Vec::new();

        for (&relation, ids) in &order.by_relation {
            let len = ids.len();
            let n_test = quota(len, opts.test_fraction);
            let n_valid = quota(len, opts.validation_fraction).min(len - n_test);
            let mut wanted = std::iter::repeat(SplitKind::Test)
                .take(n_test)
                .chain(std::iter::repeat(SplitKind::Validation).take(n_valid))
                .peekable();

            let offset = len * k / n;
            let rotated = ids[offset..].iter().chain(&ids[..offset]);

            let mut failures = 0;
            let mut placed = 0;
            for &id in rotated {
                let Some(&kind) = wanted.peek() else { break };
                if let Some(reach) = reach.as_mut() {
                    if !reach.allows(working[id]) {
                        failures += 1;
                        if failures >= opts.max_retries {
                            break;
                        }
                        continue;
                    }
                    reach.take(working[id]);
                }
                failures = 0;
                assignment[id] = kind;
                placed += 1;
                wanted.next();
            }

            let requested = n_test + n_valid;
            if placed < requested {
                let w = Warning::SplitRetriesExhausted {
                    relation: relation.to_string(),
                    requested,
                    placed,
                };
                warn!("{w}");
                warnings.push(w);
            }
            debug!(%relation, triples = len, placed, split = k, "split relation");
        }

        let mut splits = Splits::default();
        for (&t, kind) in working.iter().zip(assignment) {
            splits.get_mut(kind).positives.push(t.clone());
        }

        for kind in [SplitKind::Test, SplitKind::Validation] {
            if let Some(w) = self.check_cold_start(&splits, kind)? {
                warn!("{w}");
                warnings.push(w);
            }
        }

        info!(
            technique = %opts.technique,
            split = k,
            train = splits.train.positives.len(),
            test = splits.test.positives.len(),
            validation = splits.validation.positives.len(),
            dropped = order.dropped,
            "split graph"
        );
        Ok(SplitOutcome {
            splits,
            warnings,
            dropped: order.dropped,
        })
    }

    fn check_cold_start(&self, splits: &Splits, kind: SplitKind) -> Result<Option<Warning>> {
        let train: HashSet<&EntityId> = splits.train.entities().into_iter().collect();
        let cold: Vec<&EntityId> = splits
            .get(kind)
            .entities()
            .into_iter()
            .filter(|e| !train.contains(e))
            .collect();
        if cold.is_empty() {
            return Ok(None);
        }
        match self.options.cold_start {
            ColdStartPolicy::Forbid => Err(Error::ColdStartEntity {
                split: kind.to_string(),
                entity: cold[0].to_string(),
            }),
            ColdStartPolicy::Allow => Ok(Some(Warning::ColdStartEntities {
                split: kind.to_string(),
                count: cold.len(),
            })),
        }
    }
}

fn quota(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).round() as usize).min(n)
}

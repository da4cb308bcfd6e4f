//! Entity-corruption negatives.

use super::{GenerationContext, NegativesGenerator};
use crate::sampling::DatasetRng;
use crate::{EntityId, Error, RelationType, Result, Triple};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;

/// Which end of the positive gets replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corrupt {
    Source,
    Target,
    Both,
}

/// Where replacement entities come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidatePool {
    /// Every entity of the graph.
    #[default]
    AllEntities,
    /// Entities seen as source (for the source slot) or target (for the
    /// target slot) of the same relation.
    DomainRange,
}

/// A named strategy and how many negatives it produces per positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    /// Negatives per positive; the fractional part is the probability of
    /// one more.
    pub count: f64,
}

impl StrategySpec {
    pub fn new(name: impl Into<String>, count: impl Into<f64>) -> Self {
        Self {
            name: name.into(),
            count: count.into(),
        }
    }
}

type Fact = (RelationType, EntityId, EntityId);

/// Candidates for one slot, with and without repetition.
#[derive(Debug, Default)]
struct Slot {
    /// One entry per triple, so frequent entities are drawn more often.
    weighted: Vec<EntityId>,
    /// Each entity once.
    distinct: Vec<EntityId>,
}

impl Slot {
    fn from_members(members: Vec<&EntityId>) -> Self {
        let distinct: BTreeSet<&EntityId> = members.iter().copied().collect();
        Self {
            weighted: members.into_iter().cloned().collect(),
            distinct: distinct.into_iter().cloned().collect(),
        }
    }

    fn get(&self, equal: bool) -> &[EntityId] {
        if equal {
            &self.distinct
        } else {
            &self.weighted
        }
    }
}

/// `None` in the type position means "any type".
type PoolKey = (RelationType, Option<String>);

#[derive(Debug, Default)]
struct Pools {
    facts: HashSet<Fact>,
    types: HashMap<EntityId, String>,
    /// Every entity.
    all: Vec<EntityId>,
    /// Every entity that may stand in subject position.
    nodes: Vec<EntityId>,
    all_by_type: HashMap<String, Vec<EntityId>>,
    nodes_by_type: HashMap<String, Vec<EntityId>>,
    domains: HashMap<PoolKey, Slot>,
    ranges: HashMap<PoolKey, Slot>,
    separate_types: bool,
}

impl Pools {
    fn type_of(&self, entity: &EntityId) -> Option<String> {
        self.types.get(entity).cloned()
    }
}

/// Group `(relation, entity)` pairs by relation and by (relation, type).
fn slots<'g>(
    pairs: impl Iterator<Item = (&'g RelationType, &'g EntityId)>,
    types: &HashMap<EntityId, String>,
) -> HashMap<PoolKey, Slot> {
    let mut groups: BTreeMap<(&RelationType, Option<&str>), Vec<&EntityId>> = BTreeMap::new();
    for (relation, e) in pairs {
        groups.entry((relation, None)).or_default().push(e);
        if let Some(t) = types.get(e) {
            groups.entry((relation, Some(t.as_str()))).or_default().push(e);
        }
    }
    groups
        .into_iter()
        .map(|((r, t), members)| ((r.clone(), t.map(String::from)), Slot::from_members(members)))
        .collect()
}

/// Replace the source, the target, or both with random entities.
///
/// A draw is rejected when the corrupted triple is a known fact or was
/// already produced for the same positive. Each requested negative gets
/// `attempts_per_negative` draws; when they run out the generator returns
/// what it has.
///
/// [`CandidatePool::DomainRange`] draws are weighted by how often an entity
/// fills the slot for the relation, unless `equal_probabilities` is set.
/// After half of a negative's attempts are spent, draws switch to equal
/// weights so a very frequent original entity cannot exhaust the budget.
///
/// Literal entities (targets of data properties) are never drawn as
/// sources. A negative's `type_tag` is the type of its target.
///
/// With `separate_types` set in the [`GenerationContext`], a typed entity
/// is only replaced by entities of the same type. Untyped entities draw
/// from the whole pool.
#[derive(Debug)]
pub struct RandomCorruption {
    corrupt: Corrupt,
    pool: CandidatePool,
    equal_probabilities: bool,
    attempts_per_negative: usize,
    name: String,
    pools: Option<Pools>,
}

impl RandomCorruption {
    pub fn new(corrupt: Corrupt) -> Self {
        Self::with_pool(corrupt, CandidatePool::AllEntities)
    }

    pub fn with_pool(corrupt: Corrupt, pool: CandidatePool) -> Self {
        Self {
            corrupt,
            pool,
            equal_probabilities: false,
            attempts_per_negative: 20,
            name: strategy_name(corrupt, pool).to_string(),
            pools: None,
        }
    }

    pub fn with_attempts(mut self, attempts_per_negative: usize) -> Self {
        self.attempts_per_negative = attempts_per_negative.max(1);
        self
    }

    /// Give every domain or range entity the same chance, however often it
    /// occurs. Only affects [`CandidatePool::DomainRange`].
    pub fn with_equal_probabilities(mut self, equal: bool) -> Self {
        self.equal_probabilities = equal;
        self
    }

    pub fn corrupt(&self) -> Corrupt {
        self.corrupt
    }

    pub fn pool(&self) -> CandidatePool {
        self.pool
    }

    pub fn equal_probabilities(&self) -> bool {
        self.equal_probabilities
    }

    fn candidates<'p>(
        &self,
        pools: &'p Pools,
        relation: &RelationType,
        replaced: &EntityId,
        source_slot: bool,
        equal: bool,
    ) -> &'p [EntityId] {
        let typed = if pools.separate_types {
            pools.type_of(replaced)
        } else {
            None
        };
        match self.pool {
            CandidatePool::AllEntities => {
                let found = match (typed, source_slot) {
                    (None, true) => Some(&pools.nodes),
                    (None, false) => Some(&pools.all),
                    (Some(t), true) => pools.nodes_by_type.get(&t),
                    (Some(t), false) => pools.all_by_type.get(&t),
                };
                found.map(Vec::as_slice).unwrap_or(&[])
            }
            CandidatePool::DomainRange => {
                let key = (relation.clone(), typed);
                let slot = if source_slot {
                    pools.domains.get(&key)
                } else {
                    pools.ranges.get(&key)
                };
                slot.map(|s| s.get(equal)).unwrap_or(&[])
            }
        }
    }

    fn draw(
        &self,
        pools: &Pools,
        positive: &Triple,
        equal: bool,
        rng: &mut DatasetRng,
    ) -> Option<Triple> {
        let rel = &positive.relation;
        let new_source = match self.corrupt {
            Corrupt::Source | Corrupt::Both => Some(
                self.candidates(pools, rel, &positive.source, true, equal)
                    .choose(rng)?
                    .clone(),
            ),
            Corrupt::Target => None,
        };
        let new_target = match self.corrupt {
            Corrupt::Target | Corrupt::Both => Some(
                self.candidates(pools, rel, &positive.target, false, equal)
                    .choose(rng)?
                    .clone(),
            ),
            Corrupt::Source => None,
        };

        let mut negative = positive.clone();
        if let Some(s) = new_source {
            negative.source = s;
        }
        if let Some(t) = new_target {
            negative.type_tag = pools.type_of(&t);
            negative.target = t;
        }
        Some(negative)
    }
}

/// CLI/config name of a corruption strategy.
pub fn strategy_name(corrupt: Corrupt, pool: CandidatePool) -> &'static str {
    match (corrupt, pool) {
        (Corrupt::Source, CandidatePool::DomainRange) => "change_source",
        (Corrupt::Target, CandidatePool::DomainRange) => "change_target",
        (Corrupt::Both, CandidatePool::DomainRange) => "change_both",
        (Corrupt::Source, CandidatePool::AllEntities) => "change_source_random",
        (Corrupt::Target, CandidatePool::AllEntities) => "change_target_random",
        (Corrupt::Both, CandidatePool::AllEntities) => "change_both_random",
    }
}

impl FromStr for RandomCorruption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (corrupt, pool) = match s {
            "change_source" => (Corrupt::Source, CandidatePool::DomainRange),
            "change_target" => (Corrupt::Target, CandidatePool::DomainRange),
            "change_both" => (Corrupt::Both, CandidatePool::DomainRange),
            "change_source_random" => (Corrupt::Source, CandidatePool::AllEntities),
            "change_target_random" => (Corrupt::Target, CandidatePool::AllEntities),
            "change_both_random" => (Corrupt::Both, CandidatePool::AllEntities),
            other => return Err(Error::config(format!("unknown negatives strategy: {other}"))),
        };
        Ok(Self::with_pool(corrupt, pool))
    }
}

impl NegativesGenerator for RandomCorruption {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, ctx: &GenerationContext<'_>) -> Result<()> {
        let graph = ctx.graph;
        let types: HashMap<EntityId, String> = graph
            .entities()
            .filter_map(|e| graph.entity_type(e).map(|t| (e.clone(), t.to_string())))
            .collect();
        let literals: HashSet<&EntityId> = graph
            .triples()
            .filter(|t| t.is_data_property())
            .map(|t| &t.target)
            .collect();

        let all: Vec<EntityId> = graph.entities().cloned().collect();
        let nodes: Vec<EntityId> = all.iter().filter(|e| !literals.contains(e)).cloned().collect();
        let group = |members: &[EntityId]| {
            let mut out: HashMap<String, Vec<EntityId>> = HashMap::new();
            for e in members {
                if let Some(t) = types.get(e) {
                    out.entry(t.clone()).or_default().push(e.clone());
                }
            }
            out
        };

        let pools = Pools {
            facts: graph
                .triples()
                .map(|t| (t.relation.clone(), t.source.clone(), t.target.clone()))
                .collect(),
            all_by_type: group(&all),
            nodes_by_type: group(&nodes),
            domains: slots(graph.triples().map(|t| (&t.relation, &t.source)), &types),
            ranges: slots(graph.triples().map(|t| (&t.relation, &t.target)), &types),
            all,
            nodes,
            types,
            separate_types: ctx.separate_types,
        };
        tracing::debug!(
            generator = %self.name,
            entities = pools.all.len(),
            literals = pools.all.len() - pools.nodes.len(),
            separate_types = pools.separate_types,
            equal_probabilities = self.equal_probabilities,
            "initialized candidate pools"
        );
        self.pools = Some(pools);
        Ok(())
    }

    fn generate_negatives(
        &self,
        positive: &Triple,
        count: usize,
        rng: &mut DatasetRng,
    ) -> Result<Vec<Triple>> {
        let pools = self.pools.as_ref().ok_or_else(|| Error::Generator {
            generator: self.name.clone(),
            triple: positive.to_string(),
            message: "not initialized".into(),
        })?;

        let mut out = Vec::with_capacity(count);
        let mut emitted: HashSet<(EntityId, EntityId)> = HashSet::new();
        let budget = count.saturating_mul(self.attempts_per_negative);
        let patience = self.attempts_per_negative / 2;
        let mut misses = 0;

        for _ in 0..budget {
            if out.len() == count {
                break;
            }
            let equal = self.equal_probabilities || misses >= patience;
            let Some(negative) = self.draw(pools, positive, equal, rng) else {
                break;
            };
            let fact = (
                negative.relation.clone(),
                negative.source.clone(),
                negative.target.clone(),
            );
            if pools.facts.contains(&fact) || !emitted.insert((fact.1, fact.2)) {
                misses += 1;
                continue;
            }
            misses = 0;
            out.push(negative);
        }
        Ok(out)
    }
}

//! Scenario combiner.
//!
//! Builds the cross product of scenario axes, applies prune rules and bounds
//! the result size.
//!
//! ## Ordering
//!
//! Combinations are enumerated by a mixed-radix index over the axes: the first
//! declared axis is the most significant digit and each digit walks that
//! axis's variants sorted by id. The raw product is never materialised; the
//! combiner decodes indices on demand.
//!
//! ## Limits
//!
//! When the raw product exceeds `max_combinations` the configured
//! [`LimitPolicy`] applies: `Sample` draws a seeded stratified subset in which
//! every variant of every axis appears at least once where the limit allows,
//! `Abort` fails with [`CombinationError::LimitExceeded`]. The outcome is
//! always reported in the returned [`CombinationSet`] and logged.
//!
//! # Examples
//!
//! ```
//! use power_core::types::DataType;
//! use power_scenarios::combiner::{combine, CombinerConfig, PruneRule};
//! use power_scenarios::variant::{AxisKind, ScenarioAxis, ScenarioVariant};
//!
//! let demand = ScenarioAxis::new(
//!     "demand",
//!     AxisKind::Percentile,
//!     DataType::Consumption,
//!     vec![ScenarioVariant::identity("p10"), ScenarioVariant::identity("p90")],
//! )
//! .unwrap();
//! let outage = ScenarioAxis::new(
//!     "outage",
//!     AxisKind::Outage,
//!     DataType::Capacity,
//!     vec![ScenarioVariant::identity("none"), ScenarioVariant::identity("full")],
//! )
//! .unwrap();
//!
//! let set = combine(vec![demand, outage], &[], &CombinerConfig::default()).unwrap();
//! assert_eq!(set.len(), 4);
//! assert_eq!(set.combinations()[0].id().as_str(), "demand=p10;outage=full");
//! ```

mod combination;
mod id;
mod rules;

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use combination::{CombinationInfo, ScenarioCombination, Selection};
pub use id::{CombinationId, BASE_ID, DIGEST_LEN};
pub use rules::PruneRule;

use crate::error::CombinationError;
use crate::variant::ScenarioAxis;
use rules::ResolvedRule;

/// What to do when the raw product exceeds the limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Draw a representative stratified subset.
    #[default]
    Sample,
    /// Fail with `LimitExceeded`.
    Abort,
}

/// Combiner settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombinerConfig {
    /// Largest raw product enumerated in full
    pub max_combinations: usize,
    /// Policy when the raw product is larger
    pub limit_policy: LimitPolicy,
    /// Seed for `LimitPolicy::Sample`
    pub sample_seed: u64,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            max_combinations: 1000,
            limit_policy: LimitPolicy::Sample,
            sample_seed: 42,
        }
    }
}

/// How the size limit was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LimitOutcome {
    /// The full product was enumerated.
    WithinLimit,
    /// A seeded subset of the product was enumerated.
    Sampled {
        /// Raw product size
        raw: usize,
        /// Number of indices drawn
        sampled: usize,
        /// Seed used
        seed: u64,
    },
}

/// Ordered, pruned combinations plus bookkeeping.
#[derive(Clone, Debug)]
pub struct CombinationSet {
    combinations: Vec<ScenarioCombination>,
    raw_count: usize,
    outcome: LimitOutcome,
    pruned: usize,
    collapsed: usize,
}

impl CombinationSet {
    /// Combinations in canonical order.
    pub fn combinations(&self) -> &[ScenarioCombination] {
        &self.combinations
    }

    /// Consumes the set.
    pub fn into_combinations(self) -> Vec<ScenarioCombination> {
        self.combinations
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    /// Returns true if every combination was pruned.
    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// Ids in canonical order.
    pub fn ids(&self) -> Vec<CombinationId> {
        self.combinations.iter().map(|c| c.id().clone()).collect()
    }

    /// Looks up a combination by id.
    pub fn get(&self, id: &CombinationId) -> Option<&ScenarioCombination> {
        self.combinations.iter().find(|c| c.id() == id)
    }

    /// Size of the raw cross product.
    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    /// Limit handling.
    pub fn outcome(&self) -> LimitOutcome {
        self.outcome
    }

    /// Combinations removed by forbid and plausibility rules.
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    /// Combinations merged by deduplication.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }
}

/// Enumerates scenario combinations over a fixed set of axes.
#[derive(Clone, Debug)]
pub struct ScenarioCombiner {
    axes: Vec<ScenarioAxis>,
    rules: Vec<ResolvedRule>,
    config: CombinerConfig,
}

impl ScenarioCombiner {
    /// Validates axes and resolves rules.
    ///
    /// Duplicate axis names, unknown axes or variants in a rule, invalid rule
    /// parameters and a zero limit are configuration errors.
    pub fn new(
        axes: Vec<ScenarioAxis>,
        rules: &[PruneRule],
        config: CombinerConfig,
    ) -> Result<Self, CombinationError> {
        if config.max_combinations == 0 {
            return Err(CombinationError::ZeroLimit);
        }
        let mut names = BTreeSet::new();
        for axis in &axes {
            if !names.insert(axis.name()) {
                return Err(CombinationError::DuplicateAxis(axis.name().to_string()));
            }
        }
        let resolved = rules
            .iter()
            .enumerate()
            .map(|(i, r)| r.resolve(i, &axes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            axes,
            rules: resolved,
            config,
        })
    }

    /// Active axes in declaration order.
    pub fn axes(&self) -> &[ScenarioAxis] {
        &self.axes
    }

    /// Size of the raw cross product (saturating).
    pub fn raw_count(&self) -> usize {
        self.axes
            .iter()
            .fold(1usize, |acc, a| acc.saturating_mul(a.len()))
    }

    fn decode(&self, mut index: usize) -> Vec<usize> {
        let mut selection = vec![0; self.axes.len()];
        for (slot, axis) in selection.iter_mut().zip(&self.axes).rev() {
            *slot = index % axis.len();
            index /= axis.len();
        }
        selection
    }

    fn encode(&self, selection: &[usize]) -> usize {
        selection
            .iter()
            .zip(&self.axes)
            .fold(0usize, |acc, (&v, axis)| {
                acc.saturating_mul(axis.len()).saturating_add(v)
            })
    }

    /// Seeded subset of `k` indices out of `raw`, covering every variant
    /// where `k` allows. Returned sorted.
    fn stratified_sample(&self, raw: usize, k: usize, seed: u64) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        let perms: Vec<Vec<usize>> = self
            .axes
            .iter()
            .map(|a| {
                let mut p: Vec<usize> = (0..a.len()).collect();
                p.shuffle(&mut rng);
                p
            })
            .collect();
        let strata = self.axes.iter().map(ScenarioAxis::len).max().unwrap_or(1);

        let mut chosen = BTreeSet::new();
        for j in 0..strata {
            if chosen.len() >= k {
                break;
            }
            let selection: Vec<usize> = perms.iter().map(|p| p[j % p.len()]).collect();
            chosen.insert(self.encode(&selection));
        }
        while chosen.len() < k {
            chosen.insert(rng.gen_range(0..raw));
        }
        chosen.into_iter().collect()
    }

    fn raw_weight(&self, selection: &[usize], weighted: bool) -> f64 {
        if !weighted {
            return 1.0;
        }
        selection
            .iter()
            .zip(&self.axes)
            .map(|(&v, axis)| axis.variants()[v].weight().unwrap_or(1.0))
            .product()
    }

    fn severity_distance(&self, a: &[usize], b: &[usize]) -> f64 {
        self.axes
            .iter()
            .enumerate()
            .map(|(i, axis)| {
                (axis.variants()[a[i]].severity() - axis.variants()[b[i]].severity()).abs()
            })
            .fold(0.0, f64::max)
    }

    /// Enumerates, prunes and weights the combinations.
    pub fn combine(&self) -> Result<CombinationSet, CombinationError> {
        let raw = self.raw_count();
        let max = self.config.max_combinations;

        let (indices, outcome) = if raw <= max {
            ((0..raw).collect::<Vec<_>>(), LimitOutcome::WithinLimit)
        } else {
            match self.config.limit_policy {
                LimitPolicy::Abort => {
                    tracing::warn!(raw, max, policy = "abort", "scenario product exceeds limit");
                    return Err(CombinationError::LimitExceeded { raw, max });
                }
                LimitPolicy::Sample => {
                    let seed = self.config.sample_seed;
                    tracing::warn!(
                        raw,
                        max,
                        seed,
                        policy = "sample",
                        "scenario product exceeds limit, sampling stratified subset"
                    );
                    (
                        self.stratified_sample(raw, max, seed),
                        LimitOutcome::Sampled {
                            raw,
                            sampled: max,
                            seed,
                        },
                    )
                }
            }
        };

        let weighted = !self.axes.is_empty() && self.axes.iter().all(ScenarioAxis::fully_weighted);
        let mut candidates: Vec<(Vec<usize>, f64)> = indices
            .into_iter()
            .map(|i| {
                let sel = self.decode(i);
                let w = self.raw_weight(&sel, weighted);
                (sel, w)
            })
            .collect();

        let mut pruned = 0;
        let mut collapsed = 0;
        for rule in &self.rules {
            match rule {
                ResolvedRule::Deduplicate { threshold } => {
                    let mut kept: Vec<(Vec<usize>, f64)> = Vec::with_capacity(candidates.len());
                    for (sel, w) in candidates {
                        match kept
                            .iter_mut()
                            .find(|(k, _)| self.severity_distance(k, &sel) < *threshold)
                        {
                            Some((_, kw)) => {
                                *kw += w;
                                collapsed += 1;
                            }
                            None => kept.push((sel, w)),
                        }
                    }
                    candidates = kept;
                }
                filter => {
                    let before = candidates.len();
                    candidates.retain(|(sel, _)| !filter.rejects(&self.axes, sel));
                    pruned += before - candidates.len();
                }
            }
        }

        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        let n = candidates.len();
        let combinations: Vec<ScenarioCombination> = candidates
            .into_iter()
            .map(|(sel, w)| {
                let weight = if total > 0.0 { w / total } else { 1.0 / n as f64 };
                let selections = sel
                    .iter()
                    .zip(&self.axes)
                    .map(|(&v, axis)| Selection {
                        axis: axis.name().to_string(),
                        target: axis.target(),
                        variant: std::sync::Arc::clone(&axis.variants()[v]),
                    })
                    .collect();
                ScenarioCombination::new(selections, weight)
            })
            .collect();

        if combinations.is_empty() {
            tracing::warn!(raw, pruned, "every scenario combination was pruned");
        }
        tracing::info!(
            axes = self.axes.len(),
            raw,
            combinations = combinations.len(),
            pruned,
            collapsed,
            "scenario combinations enumerated"
        );

        Ok(CombinationSet {
            combinations,
            raw_count: raw,
            outcome,
            pruned,
            collapsed,
        })
    }
}

/// Builds a combiner and enumerates in one call.
pub fn combine(
    axes: Vec<ScenarioAxis>,
    rules: &[PruneRule],
    config: &CombinerConfig,
) -> Result<CombinationSet, CombinationError> {
    ScenarioCombiner::new(axes, rules, config.clone())?.combine()
}

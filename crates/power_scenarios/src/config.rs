//! Declarative scenario configuration.
//!
//! A [`ScenarioConfig`] lists axis specifications, prune rules and the
//! combiner limit. Axis specifications are a closed set of kinds resolved by
//! exhaustive matching; percentile axes need historical series which the
//! caller fetches according to [`AxisSpec::history_requirement`].
//!
//! ```toml
//! max_combinations = 500
//! limit_policy = "sample"
//! sample_seed = 7
//!
//! [[axes]]
//! kind = "percentile"
//! name = "demand"
//! target = "consumption"
//! levels = [10, 50, 90]
//! lookback_days = 365
//!
//! [[axes]]
//! kind = "outage"
//! name = "outage"
//! levels = [
//!     { id = "none" },
//!     { id = "full", severity = 1.0, outages = [{ derate = { mode = "multiplicative", remaining = 0.0 } }] },
//! ]
//!
//! [[rules]]
//! rule = "forbid"
//! selections = { demand = "p90", outage = "full" }
//! ```

use power_core::types::{DataSeries, DataType};
use serde::{Deserialize, Serialize};

use crate::combiner::{CombinerConfig, LimitPolicy, PruneRule};
use crate::error::ScenarioError;
use crate::generators::{
    fuel, outage, FuelShockSpec, OutageLevel, PercentileGenerator, PercentileParams,
    StatisticsProvider,
};
use crate::variant::{AxisKind, ScenarioAxis};

fn default_capacity() -> DataType {
    DataType::Capacity
}

/// One axis to generate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisSpec {
    /// Historical percentile shifts of `target`.
    Percentile {
        /// Axis name
        name: String,
        /// Series to shift
        target: DataType,
        /// Percentile levels, each in 1..=99
        levels: Vec<u8>,
        /// Days of history before the horizon to examine
        lookback_days: u32,
        /// Trailing moving-average window defining the trend (hours)
        #[serde(default)]
        trend_window_hours: Option<usize>,
        /// Minimum observations required in the lookback window
        #[serde(default)]
        min_observations: Option<usize>,
    },
    /// Capacity de-rates.
    Outage {
        /// Axis name
        name: String,
        /// Series to de-rate
        #[serde(default = "default_capacity")]
        target: DataType,
        /// Outage levels
        levels: Vec<OutageLevel>,
    },
    /// Fuel or carbon price shocks.
    FuelStress {
        /// Axis name
        name: String,
        /// Price series to shock
        target: DataType,
        /// Shocks
        shocks: Vec<FuelShockSpec>,
    },
}

impl AxisSpec {
    /// Generator parameters of a percentile axis.
    pub fn percentile_params(&self) -> Option<PercentileParams> {
        match self {
            AxisSpec::Percentile {
                levels,
                lookback_days,
                trend_window_hours,
                min_observations,
                ..
            } => {
                let defaults = PercentileParams::default();
                Some(PercentileParams {
                    levels: levels.clone(),
                    lookback_days: *lookback_days,
                    trend_window_hours: trend_window_hours.unwrap_or(defaults.trend_window_hours),
                    min_observations: min_observations.unwrap_or(defaults.min_observations),
                })
            }
            AxisSpec::Outage { .. } | AxisSpec::FuelStress { .. } => None,
        }
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        match self {
            AxisSpec::Percentile { name, .. }
            | AxisSpec::Outage { name, .. }
            | AxisSpec::FuelStress { name, .. } => name,
        }
    }

    /// Data type the axis adjusts.
    pub fn target(&self) -> DataType {
        match self {
            AxisSpec::Percentile { target, .. }
            | AxisSpec::Outage { target, .. }
            | AxisSpec::FuelStress { target, .. } => *target,
        }
    }

    /// Generator family.
    pub fn kind(&self) -> AxisKind {
        match self {
            AxisSpec::Percentile { .. } => AxisKind::Percentile,
            AxisSpec::Outage { .. } => AxisKind::Outage,
            AxisSpec::FuelStress { .. } => AxisKind::FuelStress,
        }
    }

    /// `(data type, lookback days)` of history the axis needs, if any.
    pub fn history_requirement(&self) -> Option<(DataType, u32)> {
        match self {
            AxisSpec::Percentile {
                target,
                lookback_days,
                ..
            } => Some((*target, *lookback_days)),
            AxisSpec::Outage { .. } | AxisSpec::FuelStress { .. } => None,
        }
    }

    /// Checks parameters that do not depend on data.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.target() == DataType::Price {
            return Err(ScenarioError::params(
                self.name(),
                "axes adjust model drivers; price is the forecast target",
            ));
        }
        match self {
            AxisSpec::Percentile { name, .. } => match self.percentile_params() {
                Some(params) => params.validate(name),
                None => Ok(()),
            },
            AxisSpec::Outage { name, levels, .. } => {
                if levels.is_empty() {
                    return Err(ScenarioError::params(name.as_str(), "no outage levels"));
                }
                outage::generate(name, levels).map(|_| ())
            }
            AxisSpec::FuelStress { name, target, shocks } => {
                if !target.is_fuel() {
                    return Err(ScenarioError::params(
                        name.as_str(),
                        format!("fuel stress axis must target a fuel price, got '{}'", target),
                    ));
                }
                if shocks.is_empty() {
                    return Err(ScenarioError::params(name.as_str(), "no shocks"));
                }
                fuel::generate(name, shocks).map(|_| ())
            }
        }
    }

    /// Builds the axis.
    ///
    /// `histories` holds the target series per market for percentile axes and
    /// is ignored otherwise. Per-market generation failures are returned
    /// next to the axis; the build fails only when no market succeeds.
    pub fn build(
        &self,
        histories: &[DataSeries],
        stats: &dyn StatisticsProvider,
    ) -> Result<(ScenarioAxis, Vec<ScenarioError>), ScenarioError> {
        match self {
            AxisSpec::Percentile { name, target, .. } => {
                let params = self.percentile_params().unwrap_or_default();
                let gen = PercentileGenerator::new(name.clone(), params, stats)?;
                let (variants, errors) = gen.generate_markets(histories);
                if variants.is_empty() {
                    return Err(errors.into_iter().next().unwrap_or_else(|| {
                        ScenarioError::params(name.as_str(), "no history supplied")
                    }));
                }
                let axis = ScenarioAxis::new(name.clone(), AxisKind::Percentile, *target, variants)?;
                Ok((axis, errors))
            }
            AxisSpec::Outage { name, target, levels } => {
                let variants = outage::generate(name, levels)?;
                Ok((ScenarioAxis::new(name.clone(), AxisKind::Outage, *target, variants)?, Vec::new()))
            }
            AxisSpec::FuelStress { name, target, shocks } => {
                let variants = fuel::generate(name, shocks)?;
                Ok((
                    ScenarioAxis::new(name.clone(), AxisKind::FuelStress, *target, variants)?,
                    Vec::new(),
                ))
            }
        }
    }
}

fn default_max_combinations() -> usize {
    CombinerConfig::default().max_combinations
}

fn default_seed() -> u64 {
    CombinerConfig::default().sample_seed
}

/// Axes, prune rules and combiner limit for a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Axis specifications in declaration order
    #[serde(default)]
    pub axes: Vec<AxisSpec>,
    /// Prune rules in evaluation order
    #[serde(default)]
    pub rules: Vec<PruneRule>,
    /// Maximum raw product enumerated in full
    #[serde(default = "default_max_combinations")]
    pub max_combinations: usize,
    /// Policy above the maximum
    #[serde(default)]
    pub limit_policy: LimitPolicy,
    /// Seed for sampling
    #[serde(default = "default_seed")]
    pub sample_seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            axes: Vec::new(),
            rules: Vec::new(),
            max_combinations: default_max_combinations(),
            limit_policy: LimitPolicy::default(),
            sample_seed: default_seed(),
        }
    }
}

impl ScenarioConfig {
    /// Combiner settings.
    pub fn combiner_config(&self) -> CombinerConfig {
        CombinerConfig {
            max_combinations: self.max_combinations,
            limit_policy: self.limit_policy,
            sample_seed: self.sample_seed,
        }
    }

    /// Validates every axis and collects the messages.
    pub fn validate(&self) -> Vec<String> {
        let mut errors: Vec<String> = self
            .axes
            .iter()
            .filter_map(|a| a.validate().err().map(|e| e.to_string()))
            .collect();
        if self.max_combinations == 0 {
            errors.push("scenarios.max_combinations must be positive".to_string());
        }
        let mut names: Vec<&str> = self.axes.iter().map(AxisSpec::name).collect();
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                errors.push(format!("duplicate axis name '{}'", pair[0]));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::LinearInterpolation;

    const SAMPLE: &str = r#"
        max_combinations = 500
        limit_policy = "abort"

        [[axes]]
        kind = "percentile"
        name = "demand"
        target = "consumption"
        levels = [10, 50, 90]
        lookback_days = 365

        [[axes]]
        kind = "outage"
        name = "outage"
        levels = [
            { id = "none" },
            { id = "full", severity = 1.0, outages = [{ derate = { mode = "multiplicative", remaining = 0.0 } }] },
        ]

        [[axes]]
        kind = "fuel_stress"
        name = "gas"
        target = "gas"
        shocks = [
            { id = "up20", size = { type = "percent", value = 20.0 } },
            { id = "flat", size = { type = "absolute", value = 0.0 } },
        ]

        [[rules]]
        rule = "forbid"
        selections = { demand = "p90", outage = "full" }
    "#;

    #[test]
    fn test_parse_full_config() {
        let config: ScenarioConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.axes.len(), 3);
        assert_eq!(config.limit_policy, LimitPolicy::Abort);
        assert_eq!(config.sample_seed, 42);
        assert_eq!(config.axes[0].history_requirement(), Some((DataType::Consumption, 365)));
        assert_eq!(config.axes[1].target(), DataType::Capacity);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config: ScenarioConfig = toml::from_str(SAMPLE).unwrap();
        config.max_combinations = 0;
        config.axes.push(AxisSpec::FuelStress {
            name: "gas".into(),
            target: DataType::Consumption,
            shocks: vec![],
        });
        let errors = config.validate();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_build_non_data_axes() {
        let config: ScenarioConfig = toml::from_str(SAMPLE).unwrap();
        let (axis, errors) = config.axes[2].build(&[], &LinearInterpolation).unwrap();
        assert!(errors.is_empty());
        assert_eq!(axis.len(), 2);
        assert_eq!(axis.variants()[0].id(), "flat");
    }

    #[test]
    fn test_percentile_without_history_fails() {
        let config: ScenarioConfig = toml::from_str(SAMPLE).unwrap();
        assert!(config.axes[0].build(&[], &LinearInterpolation).is_err());
    }
}

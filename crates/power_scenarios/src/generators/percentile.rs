//! Historical-percentile scenario generator.
//!
//! For one market, the generator measures how far each historical observation
//! deviated from its trailing moving-average trend over the lookback window,
//! then turns selected percentiles of that deviation distribution into
//! constant shifts of the base series. Variant `pNN` shifts by the NN-th
//! percentile deviation, so `p50` is close to the unadjusted base and `p90`
//! describes a high-side outcome.
//!
//! The percentile statistic itself is pluggable through [`StatisticsProvider`].

use std::collections::BTreeMap;

use chrono::Duration;
use power_core::types::{DataSeries, MarketCode};
use serde::{Deserialize, Serialize};

use crate::adjustment::Adjustment;
use crate::error::ScenarioError;
use crate::variant::{ScenarioVariant, VariantParams};

/// Source of percentile estimates.
pub trait StatisticsProvider: Send + Sync {
    /// `level`-th percentile (0..=100) of `sample`; `None` if the sample is empty.
    fn percentile(&self, sample: &[f64], level: f64) -> Option<f64>;
}

/// Percentile by linear interpolation between closest ranks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolation;

impl StatisticsProvider for LinearInterpolation {
    fn percentile(&self, sample: &[f64], level: f64) -> Option<f64> {
        if sample.is_empty() {
            return None;
        }
        let mut sorted = sample.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = (level.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
    }
}

/// Configuration of the percentile generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PercentileParams {
    /// Percentile levels, each in 1..=99
    pub levels: Vec<u8>,
    /// Days of history before the horizon to examine
    pub lookback_days: u32,
    /// Trailing moving-average window defining the trend (hours)
    #[serde(default = "default_trend_window")]
    pub trend_window_hours: usize,
    /// Minimum observations required in the lookback window
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
}

fn default_trend_window() -> usize {
    24
}

fn default_min_observations() -> usize {
    168
}

impl Default for PercentileParams {
    fn default() -> Self {
        Self {
            levels: vec![10, 50, 90],
            lookback_days: 365,
            trend_window_hours: default_trend_window(),
            min_observations: default_min_observations(),
        }
    }
}

impl PercentileParams {
    /// Checks ranges and uniqueness of the levels.
    pub fn validate(&self, axis: &str) -> Result<(), ScenarioError> {
        if self.levels.is_empty() {
            return Err(ScenarioError::params(axis, "no percentile levels"));
        }
        let mut levels = self.levels.clone();
        levels.sort_unstable();
        levels.dedup();
        if levels.len() != self.levels.len() {
            return Err(ScenarioError::params(axis, "duplicate percentile levels"));
        }
        if let Some(bad) = self.levels.iter().find(|l| **l == 0 || **l > 99) {
            return Err(ScenarioError::params(
                axis,
                format!("percentile level {} outside 1..=99", bad),
            ));
        }
        if self.lookback_days == 0 {
            return Err(ScenarioError::params(axis, "lookback_days must be positive"));
        }
        if self.trend_window_hours == 0 {
            return Err(ScenarioError::params(axis, "trend_window_hours must be positive"));
        }
        Ok(())
    }
}

/// Variant id for a percentile level (`p05`, `p50`, ...).
pub fn percentile_id(level: u8) -> String {
    format!("p{:02}", level)
}

/// Deviations of `values` from their trailing moving average.
///
/// Only positions with a full window contribute.
fn trend_deviations(values: &[f64], window: usize) -> Vec<f64> {
    if values.len() < window || window == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(values[window - 1] - sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(values[i] - sum / window as f64);
    }
    out
}

/// Generator of historical-percentile variants.
pub struct PercentileGenerator<'a> {
    axis: String,
    params: PercentileParams,
    stats: &'a dyn StatisticsProvider,
}

impl<'a> PercentileGenerator<'a> {
    /// Creates a generator after validating `params`.
    pub fn new(
        axis: impl Into<String>,
        params: PercentileParams,
        stats: &'a dyn StatisticsProvider,
    ) -> Result<Self, ScenarioError> {
        let axis = axis.into();
        params.validate(&axis)?;
        Ok(Self {
            axis,
            params,
            stats,
        })
    }

    /// Parameters in use.
    pub fn params(&self) -> &PercentileParams {
        &self.params
    }

    /// Percentile offsets for one market, in level order.
    ///
    /// Only the last `lookback_days` of `history` are examined.
    pub fn offsets(&self, history: &DataSeries) -> Result<Vec<(u8, f64)>, ScenarioError> {
        let window = match history.last_timestamp() {
            Some(last) => {
                let end = last + Duration::hours(1);
                history.window(end - Duration::days(i64::from(self.params.lookback_days)), end)
            }
            None => history.clone(),
        };
        let required = self.params.min_observations.max(self.params.trend_window_hours);
        if window.len() < required {
            return Err(ScenarioError::InsufficientHistory {
                market: history.market(),
                data_type: history.data_type(),
                required,
                available: window.len(),
            });
        }

        let deviations = trend_deviations(window.values(), self.params.trend_window_hours);
        let mut levels = self.params.levels.clone();
        levels.sort_unstable();
        levels
            .into_iter()
            .map(|level| {
                self.stats
                    .percentile(&deviations, f64::from(level))
                    .map(|offset| (level, offset))
                    .ok_or_else(|| ScenarioError::InsufficientHistory {
                        market: history.market(),
                        data_type: history.data_type(),
                        required,
                        available: 0,
                    })
            })
            .collect()
    }

    /// Variants for a single market: one `Shift` per percentile level.
    pub fn generate(&self, history: &DataSeries) -> Result<Vec<ScenarioVariant>, ScenarioError> {
        let market = history.market();
        let variants = self
            .offsets(history)?
            .into_iter()
            .map(|(level, offset)| {
                let mut by_market = BTreeMap::new();
                by_market.insert(market, Adjustment::Shift { offset });
                self.variant(level, by_market)
            })
            .collect();
        tracing::debug!(
            axis = %self.axis,
            market = %market,
            levels = self.params.levels.len(),
            "generated percentile variants"
        );
        Ok(variants)
    }

    /// Variants covering several markets.
    ///
    /// Each variant holds one shift per market under a shared id. Markets
    /// whose history is insufficient are reported separately and left out
    /// of the adjustments.
    pub fn generate_markets(
        &self,
        histories: &[DataSeries],
    ) -> (Vec<ScenarioVariant>, Vec<ScenarioError>) {
        use rayon::prelude::*;

        let results: Vec<Result<(MarketCode, Vec<(u8, f64)>), ScenarioError>> = histories
            .par_iter()
            .map(|h| self.offsets(h).map(|o| (h.market(), o)))
            .collect();

        let mut per_level: BTreeMap<u8, BTreeMap<MarketCode, Adjustment>> = BTreeMap::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok((market, offsets)) => {
                    for (level, offset) in offsets {
                        per_level
                            .entry(level)
                            .or_default()
                            .insert(market, Adjustment::Shift { offset });
                    }
                }
                Err(e) => errors.push(e),
            }
        }
        let variants = per_level
            .into_iter()
            .map(|(level, by_market)| self.variant(level, by_market))
            .collect();
        (variants, errors)
    }

    fn variant(&self, level: u8, by_market: BTreeMap<MarketCode, Adjustment>) -> ScenarioVariant {
        ScenarioVariant::new(
            percentile_id(level),
            VariantParams::Percentile {
                level,
                lookback_days: self.params.lookback_days,
            },
            Adjustment::PerMarket { by_market },
        )
        .with_severity(f64::from(level) / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};
    use power_core::types::DataType;

    fn hour(h: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(h)
    }

    fn history(market: MarketCode, values: &[f64]) -> DataSeries {
        DataSeries::new(
            market,
            DataType::Consumption,
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (hour(i as i64), *v))
                .collect(),
        )
        .unwrap()
    }

    fn params(min_observations: usize) -> PercentileParams {
        PercentileParams {
            levels: vec![90, 10, 50],
            lookback_days: 30,
            trend_window_hours: 2,
            min_observations,
        }
    }

    #[test]
    fn test_linear_interpolation_percentile() {
        let stats = LinearInterpolation;
        let sample = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_relative_eq!(stats.percentile(&sample, 50.0).unwrap(), 3.0);
        assert_relative_eq!(stats.percentile(&sample, 10.0).unwrap(), 1.4);
        assert_relative_eq!(stats.percentile(&sample, 100.0).unwrap(), 5.0);
        assert!(stats.percentile(&[], 50.0).is_none());
    }

    #[test]
    fn test_trend_deviations() {
        let dev = trend_deviations(&[1.0, 3.0, 3.0, 7.0], 2);
        assert_eq!(dev, vec![1.0, 0.0, 2.0]);
        assert!(trend_deviations(&[1.0], 2).is_empty());
    }

    #[test]
    fn test_generate_sorted_ids_and_severity() {
        let stats = LinearInterpolation;
        let gen = PercentileGenerator::new("demand", params(4), &stats).unwrap();
        let hist = history(MarketCode::De, &[10.0, 12.0, 9.0, 14.0, 11.0, 13.0]);
        let variants = gen.generate(&hist).unwrap();
        let ids: Vec<_> = variants.iter().map(|v| v.id().to_string()).collect();
        assert_eq!(ids, vec!["p10", "p50", "p90"]);
        assert_relative_eq!(variants[2].severity(), 0.9);
    }

    #[test]
    fn test_offsets_increase_with_level() {
        let stats = LinearInterpolation;
        let gen = PercentileGenerator::new("demand", params(4), &stats).unwrap();
        let hist = history(MarketCode::De, &[10.0, 12.0, 9.0, 14.0, 11.0, 13.0]);
        let offsets = gen.offsets(&hist).unwrap();
        assert!(offsets[0].1 <= offsets[1].1 && offsets[1].1 <= offsets[2].1);
    }

    #[test]
    fn test_insufficient_history() {
        let stats = LinearInterpolation;
        let gen = PercentileGenerator::new("demand", params(10), &stats).unwrap();
        let err = gen.generate(&history(MarketCode::Fr, &[1.0, 2.0, 3.0])).unwrap_err();
        assert_eq!(
            err,
            ScenarioError::InsufficientHistory {
                market: MarketCode::Fr,
                data_type: DataType::Consumption,
                required: 10,
                available: 3,
            }
        );
    }

    #[test]
    fn test_generate_markets_merges_and_reports() {
        let stats = LinearInterpolation;
        let gen = PercentileGenerator::new("demand", params(4), &stats).unwrap();
        let histories = vec![
            history(MarketCode::De, &[10.0, 12.0, 9.0, 14.0, 11.0]),
            history(MarketCode::Nl, &[5.0, 6.0, 5.0, 7.0, 6.0]),
            history(MarketCode::Fr, &[1.0]),
        ];
        let (variants, errors) = gen.generate_markets(&histories);
        assert_eq!(variants.len(), 3);
        assert_eq!(errors.len(), 1);
        match variants[0].adjustment() {
            Adjustment::PerMarket { by_market } => {
                assert!(by_market.contains_key(&MarketCode::De));
                assert!(by_market.contains_key(&MarketCode::Nl));
                assert!(!by_market.contains_key(&MarketCode::Fr));
            }
            other => panic!("unexpected adjustment {:?}", other),
        }
    }

    #[test]
    fn test_invalid_levels_rejected() {
        let stats = LinearInterpolation;
        let mut p = params(4);
        p.levels = vec![0, 50];
        assert!(PercentileGenerator::new("demand", p, &stats).is_err());
        let mut p = params(4);
        p.levels = vec![50, 50];
        assert!(PercentileGenerator::new("demand", p, &stats).is_err());
    }

    #[test]
    fn test_percentile_id_padding() {
        assert_eq!(percentile_id(5), "p05");
        assert_eq!(percentile_id(90), "p90");
    }
}

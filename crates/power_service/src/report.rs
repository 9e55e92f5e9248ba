//! Run report.

use std::collections::BTreeMap;

use power_core::types::{DateRange, MarketCode};
use power_forecast::{CancelReason, ExecutorStats};
use power_scenarios::LimitOutcome;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Failure, FailureRecord};

/// Counts and failures of one run, written as `run_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Forecast horizon
    pub horizon: DateRange,
    /// Requested markets
    pub markets: Vec<MarketCode>,
    /// Markets whose inputs loaded and were forecast
    pub forecast_markets: Vec<MarketCode>,
    /// Size of the raw scenario product
    pub raw_combinations: usize,
    /// Combinations forecast
    pub combinations: usize,
    /// Combinations removed by forbid and severity rules
    pub pruned: usize,
    /// Combinations merged by similarity collapse
    pub collapsed: usize,
    /// How the combination limit was handled
    pub limit: LimitOutcome,
    /// Curves produced
    pub curves: usize,
    /// Spread results produced
    pub spreads: usize,
    /// Models trained during this run
    pub trainings: usize,
    /// Cache hits during this run
    pub cache_hits: usize,
    /// Thermal deferrals during this run
    pub thermal_deferrals: usize,
    /// Why the run was cancelled, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<CancelReason>,
    /// Failure count per stage
    pub failures_by_stage: BTreeMap<&'static str, usize>,
    /// Every failure
    pub failures: Vec<FailureRecord>,
}

/// Executor counters accumulated between two snapshots.
pub(crate) fn stats_delta(before: &ExecutorStats, after: &ExecutorStats) -> (usize, usize, usize) {
    (
        after.trainings.saturating_sub(before.trainings),
        after.cache_hits.saturating_sub(before.cache_hits),
        after.admission.deferrals.saturating_sub(before.admission.deferrals),
    )
}

impl RunReport {
    /// Empty report for `horizon` and `markets`.
    pub fn new(horizon: DateRange, markets: Vec<MarketCode>) -> Self {
        Self {
            horizon,
            markets,
            forecast_markets: Vec::new(),
            raw_combinations: 0,
            combinations: 0,
            pruned: 0,
            collapsed: 0,
            limit: LimitOutcome::WithinLimit,
            curves: 0,
            spreads: 0,
            trainings: 0,
            cache_hits: 0,
            thermal_deferrals: 0,
            cancelled: None,
            failures_by_stage: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Records the failure list.
    pub fn with_failures(mut self, failures: &[Failure]) -> Self {
        self.failures_by_stage.clear();
        for f in failures {
            *self.failures_by_stage.entry(f.stage()).or_insert(0) += 1;
        }
        self.failures = failures.iter().map(Failure::record).collect();
        self
    }

    /// Returns true when nothing failed and the run was not cancelled.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_none()
    }

    /// Logs the summary line.
    pub fn log(&self) {
        info!(
            horizon = %self.horizon,
            markets = self.markets.len(),
            forecast_markets = self.forecast_markets.len(),
            combinations = self.combinations,
            raw_combinations = self.raw_combinations,
            curves = self.curves,
            spreads = self.spreads,
            trainings = self.trainings,
            cache_hits = self.cache_hits,
            failures = self.failures.len(),
            "Run finished"
        );
        for (stage, count) in &self.failures_by_stage {
            warn!(stage, count, "Run recorded failures");
        }
        if let Some(reason) = &self.cancelled {
            warn!(reason = %reason, "Run was cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use power_core::DataError;
    use power_core::types::DataType;

    #[test]
    fn test_failures_counted_by_stage() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let horizon = DateRange::new(d, d).unwrap();
        let failures = vec![
            Failure::Data(DataError::unavailable(DataType::Gas, MarketCode::De, d, d, "x")),
            Failure::Data(DataError::unavailable(DataType::Wind, MarketCode::De, d, d, "y")),
        ];
        let report = RunReport::new(horizon, vec![MarketCode::De]).with_failures(&failures);
        assert_eq!(report.failures_by_stage.get("data"), Some(&2));
        assert!(!report.is_clean());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["limit"]["outcome"], "within_limit");
        assert_eq!(json["failures"][0]["stage"], "data");
        assert!(json.get("cancelled").is_none());
    }
}

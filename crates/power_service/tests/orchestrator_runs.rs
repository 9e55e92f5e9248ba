//! End-to-end runs over the synthetic provider.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use power_core::types::{DataType, DateRange, MarketCatalog, MarketCode};
use power_core::{DataError, DataProvider, DataSeries, FetchOptions};
use power_forecast::admission::SensorError;
use power_forecast::model::RidgeRegressor;
use power_forecast::{CancelReason, ExecutorConfig, FixedSensor, ThermalSensor};
use power_scenarios::adjustment::Derate;
use power_scenarios::generators::{FuelShockSpec, OutageLevel};
use power_scenarios::{AxisSpec, CombinationError, CombinationId, LimitPolicy, PruneRule, ScenarioConfig};
use power_service::artifacts::{read_curves, read_spreads, write_run};
use power_service::error::{Failure, ServiceError};
use power_service::orchestrator::Orchestrator;
use power_service::synthetic::SyntheticProvider;
use power_spreads::{MissingInput, SpreadDefinition, SpreadOp};

fn horizon() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
    )
    .unwrap()
}

fn orchestrator(provider: SyntheticProvider) -> Orchestrator<SyntheticProvider, RidgeRegressor> {
    let executor = ExecutorConfig {
        concurrency: 2,
        training_days: 14,
        poll_interval_ms: 1,
        ..ExecutorConfig::default()
    };
    Orchestrator::new(
        provider,
        RidgeRegressor,
        Arc::new(FixedSensor(40.0)),
        executor,
        MarketCatalog::default_europe(),
        48,
    )
    .unwrap()
}

fn gas_and_outage() -> ScenarioConfig {
    ScenarioConfig {
        axes: vec![
            AxisSpec::FuelStress {
                name: "gas".into(),
                target: DataType::Gas,
                shocks: vec![FuelShockSpec::percent("up20", 20.0), FuelShockSpec::percent("flat", 0.0)],
            },
            AxisSpec::Outage {
                name: "outage".into(),
                target: DataType::Capacity,
                levels: vec![
                    OutageLevel::none("none"),
                    OutageLevel::single("half", Derate::Multiplicative { remaining: 0.5 }, 0.5),
                ],
            },
        ],
        rules: vec![PruneRule::Forbid {
            selections: BTreeMap::from([
                ("gas".to_string(), "up20".to_string()),
                ("outage".to_string(), "half".to_string()),
            ]),
        }],
        ..ScenarioConfig::default()
    }
}

fn spreads() -> Vec<SpreadDefinition> {
    vec![
        SpreadDefinition::InterMarket {
            name: "de-fr".into(),
            long: MarketCode::De,
            short: MarketCode::Fr,
            op: SpreadOp::Difference,
        },
        SpreadDefinition::CleanSpark {
            name: "de-css".into(),
            market: MarketCode::De,
            efficiency: 0.5,
            carbon_intensity: 0.37,
        },
    ]
}

fn id(s: &str) -> CombinationId {
    s.parse().unwrap()
}

#[test]
fn test_full_run() {
    let orch = orchestrator(SyntheticProvider::new(5));
    let output = orch
        .get_forecast_curves(&[MarketCode::De, MarketCode::Fr], horizon(), &gas_and_outage(), &spreads())
        .unwrap();

    assert!(output.failures.is_empty(), "{:?}", output.failures);
    assert_eq!(output.combinations.len(), 3);
    assert_eq!(output.curves.len(), 6);
    assert_eq!(output.spreads.len(), 6);
    assert_eq!(output.report.pruned, 1);
    assert_eq!(output.report.raw_combinations, 4);
    // one model per market, reused by every combination
    assert_eq!(output.report.trainings, 2);
    assert_eq!(output.report.cache_hits, 4);
    assert!(output.report.is_clean());

    for market in [MarketCode::De, MarketCode::Fr] {
        let first = output.curves.get(&id("gas=flat;outage=none"), market).unwrap();
        assert_eq!(first.len(), 48);
        for combination in output.curves.combination_ids() {
            let curve = output.curves.get(combination, market).unwrap();
            assert_eq!(curve.timestamps[..], first.timestamps[..]);
        }
    }

    let flat = output.curves.get(&id("gas=flat;outage=none"), MarketCode::De).unwrap();
    let up = output.curves.get(&id("gas=up20;outage=none"), MarketCode::De).unwrap();
    let (flat_gas, up_gas) = (flat.driver(DataType::Gas).unwrap(), up.driver(DataType::Gas).unwrap());
    for (f, u) in flat_gas.iter().zip(up_gas) {
        assert_relative_eq!(*u, f * 1.2, max_relative = 1e-9);
    }
    assert!(output.curves.get(&id("gas=up20;outage=half"), MarketCode::De).is_none());
}

#[test]
fn test_runs_are_reproducible() {
    let a = orchestrator(SyntheticProvider::new(9))
        .get_forecast_curves(&[MarketCode::Nl], horizon(), &gas_and_outage(), &[])
        .unwrap();
    let b = orchestrator(SyntheticProvider::new(9))
        .get_forecast_curves(&[MarketCode::Nl], horizon(), &gas_and_outage(), &[])
        .unwrap();
    let ids_a: Vec<_> = a.combinations.iter().map(|c| c.id.clone()).collect();
    let ids_b: Vec<_> = b.combinations.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(a.curves, b.curves);
}

#[test]
fn test_missing_market_data_is_isolated() {
    let provider = SyntheticProvider::new(5).with_gap(MarketCode::Fr, DataType::Wind);
    let output = orchestrator(provider)
        .get_forecast_curves(&[MarketCode::De, MarketCode::Fr], horizon(), &gas_and_outage(), &spreads())
        .unwrap();

    assert_eq!(output.report.forecast_markets, vec![MarketCode::De]);
    assert_eq!(output.curves.len(), 3);
    assert!(output.curves.iter().all(|c| c.market == MarketCode::De));

    let data: Vec<_> = output.failures.iter().filter(|f| f.stage() == "data").collect();
    // history and projection requests both fail
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|f| f.market() == Some(MarketCode::Fr)));

    // the clean spark on DE survives; the DE-FR spread is skipped per combination
    assert_eq!(output.spreads.len(), 3);
    assert!(output.spreads.iter().all(|s| s.name == "de-css"));
    let skipped: Vec<_> = output
        .failures
        .iter()
        .filter_map(|f| match f {
            Failure::Spread(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(skipped.len(), 3);
    assert!(skipped
        .iter()
        .all(|e| e.input == MissingInput::Curve { market: MarketCode::Fr }));
    assert_eq!(output.report.failures_by_stage.get("spread"), Some(&3));
}

#[test]
fn test_stale_data_reported() {
    let last = NaiveDate::from_ymd_opt(2025, 2, 25).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let output = orchestrator(SyntheticProvider::new(5).with_last_available(last))
        .get_forecast_curves(&[MarketCode::Be], horizon(), &ScenarioConfig::default(), &[])
        .unwrap();
    assert!(output.curves.is_empty());
    assert!(output.report.forecast_markets.is_empty());
    assert!(output.failures.iter().all(|f| f.stage() == "data"));
    assert!(output
        .failures
        .iter()
        .any(|f| matches!(f, Failure::Data(DataError::Stale { .. }))));
}

#[test]
fn test_unknown_rule_axis_fails_before_forecasting() {
    let mut scenarios = gas_and_outage();
    scenarios.rules = vec![PruneRule::Forbid {
        selections: BTreeMap::from([("demand".to_string(), "p90".to_string())]),
    }];
    let orch = orchestrator(SyntheticProvider::new(5));
    let err = orch
        .get_forecast_curves(&[MarketCode::De], horizon(), &scenarios, &[])
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Combination(CombinationError::UnknownAxis { .. })
    ));
    assert_eq!(orch.executor().stats().trainings, 0);
}

#[test]
fn test_abort_policy_over_limit() {
    let mut scenarios = gas_and_outage();
    scenarios.max_combinations = 3;
    scenarios.limit_policy = LimitPolicy::Abort;
    let err = orchestrator(SyntheticProvider::new(5))
        .get_forecast_curves(&[MarketCode::De], horizon(), &scenarios, &[])
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Combination(CombinationError::LimitExceeded { raw: 4, max: 3 })
    ));
}

#[test]
fn test_invalid_spread_is_a_config_error() {
    let bad = SpreadDefinition::Capacity {
        name: "cap".into(),
        from: MarketCode::De,
        to: MarketCode::De,
        capacity_mw: 100.0,
    };
    let err = orchestrator(SyntheticProvider::new(5))
        .get_forecast_curves(&[MarketCode::De], horizon(), &ScenarioConfig::default(), &[bad])
        .unwrap_err();
    assert!(matches!(err, ServiceError::Config(_)));
}

#[test]
fn test_percentile_axis_from_history() {
    let scenarios = ScenarioConfig {
        axes: vec![AxisSpec::Percentile {
            name: "demand".into(),
            target: DataType::Consumption,
            levels: vec![10, 50, 90],
            lookback_days: 60,
            trend_window_hours: None,
            min_observations: None,
        }],
        ..ScenarioConfig::default()
    };
    let output = orchestrator(SyntheticProvider::new(5))
        .get_forecast_curves(&[MarketCode::De, MarketCode::Fr], horizon(), &scenarios, &[])
        .unwrap();
    let ids: Vec<_> = output.combinations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["demand=p10", "demand=p50", "demand=p90"]);
    assert_eq!(output.curves.len(), 6);

    let low = output.curves.get(&id("demand=p10"), MarketCode::De).unwrap();
    let high = output.curves.get(&id("demand=p90"), MarketCode::De).unwrap();
    let low_load: f64 = low.driver(DataType::Consumption).unwrap().iter().sum();
    let high_load: f64 = high.driver(DataType::Consumption).unwrap().iter().sum();
    assert!(high_load > low_load);
}

#[test]
fn test_artifacts_written() {
    let output = orchestrator(SyntheticProvider::new(5))
        .get_forecast_curves(&[MarketCode::De, MarketCode::Fr], horizon(), &gas_and_outage(), &spreads())
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let paths = write_run(&dir.path().join("run"), &output).unwrap();

    let curves = read_curves(&paths.curves).unwrap();
    assert_eq!(curves.len(), 6 * 48);
    let spreads = read_spreads(&paths.spreads).unwrap();
    assert_eq!(spreads.len(), 6 * 48);

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.summary).unwrap()).unwrap();
    assert_eq!(summary["curves"], 6);
    assert_eq!(summary["combinations"], 3);
    let combinations: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.combinations).unwrap()).unwrap();
    assert_eq!(combinations.as_array().unwrap().len(), 3);
}

/// Serves FR consumption only for the last 20 days before the horizon.
struct ShortHistory(SyntheticProvider);

impl DataProvider for ShortHistory {
    fn name(&self) -> &str {
        "short-history"
    }

    fn fetch(
        &self,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        opts: &FetchOptions,
    ) -> Result<DataSeries, DataError> {
        let earliest = NaiveDate::from_ymd_opt(2025, 2, 11).unwrap();
        if market == MarketCode::Fr && data_type == DataType::Consumption && start < earliest {
            return Err(DataError::unavailable(data_type, market, start, end, "archive starts 2025-02-11"));
        }
        self.0.fetch(data_type, market, start, end, opts)
    }
}

#[test]
fn test_market_without_percentile_history_is_not_forecast() {
    let scenarios = ScenarioConfig {
        axes: vec![AxisSpec::Percentile {
            name: "demand".into(),
            target: DataType::Consumption,
            levels: vec![10, 50, 90],
            lookback_days: 60,
            trend_window_hours: None,
            min_observations: None,
        }],
        ..ScenarioConfig::default()
    };
    let executor = ExecutorConfig {
        concurrency: 2,
        training_days: 14,
        poll_interval_ms: 1,
        ..ExecutorConfig::default()
    };
    let orch = Orchestrator::new(
        ShortHistory(SyntheticProvider::new(5)),
        RidgeRegressor,
        Arc::new(FixedSensor(40.0)),
        executor,
        MarketCatalog::default_europe(),
        48,
    )
    .unwrap();
    let output = orch
        .get_forecast_curves(&[MarketCode::De, MarketCode::Fr], horizon(), &scenarios, &[])
        .unwrap();

    assert_eq!(output.report.forecast_markets, vec![MarketCode::De]);
    assert_eq!(output.curves.len(), 3);
    assert!(output.curves.iter().all(|c| c.market == MarketCode::De));
    assert!(output
        .failures
        .iter()
        .any(|f| matches!(f, Failure::Data(_)) && f.market() == Some(MarketCode::Fr)));
    assert!(output.failures.iter().any(|f| matches!(
        f,
        Failure::Uncovered { market: MarketCode::Fr, axis } if axis == "demand"
    )));

    // DE still receives distinct percentile shifts
    let low = output.curves.get(&id("demand=p10"), MarketCode::De).unwrap();
    let high = output.curves.get(&id("demand=p90"), MarketCode::De).unwrap();
    assert_ne!(low.driver(DataType::Consumption), high.driver(DataType::Consumption));
}

#[test]
fn test_repeated_markets_forecast_once() {
    let output = orchestrator(SyntheticProvider::new(5))
        .get_forecast_curves(&[MarketCode::De, MarketCode::De], horizon(), &gas_and_outage(), &[])
        .unwrap();
    assert!(output.failures.is_empty(), "{:?}", output.failures);
    assert_eq!(output.report.forecast_markets, vec![MarketCode::De]);
    assert_eq!(output.curves.len(), 3);
    assert_eq!(output.report.trainings, 1);
}

struct SwitchableSensor {
    hot: AtomicBool,
}

impl ThermalSensor for SwitchableSensor {
    fn name(&self) -> &str {
        "switchable"
    }

    fn read_celsius(&self) -> Result<f64, SensorError> {
        Ok(if self.hot.load(Ordering::SeqCst) { 95.0 } else { 40.0 })
    }
}

#[test]
fn test_thermal_cancellation_reported_for_its_run_only() {
    let sensor = Arc::new(SwitchableSensor {
        hot: AtomicBool::new(true),
    });
    let executor = ExecutorConfig {
        concurrency: 1,
        training_days: 14,
        poll_interval_ms: 1,
        thermal_ceiling_c: 85.0,
        max_thermal_wait_ms: 5,
        ..ExecutorConfig::default()
    };
    let orch = Orchestrator::new(
        SyntheticProvider::new(5),
        RidgeRegressor,
        sensor.clone(),
        executor,
        MarketCatalog::default_europe(),
        48,
    )
    .unwrap();

    let hot = orch
        .get_forecast_curves(&[MarketCode::De], horizon(), &ScenarioConfig::default(), &[])
        .unwrap();
    assert!(hot.curves.is_empty());
    assert!(matches!(hot.report.cancelled, Some(CancelReason::ThermalCeiling { .. })));

    sensor.hot.store(false, Ordering::SeqCst);
    let cool = orch
        .get_forecast_curves(&[MarketCode::De], horizon(), &ScenarioConfig::default(), &[])
        .unwrap();
    assert_eq!(cool.curves.len(), 1);
    assert!(cool.failures.is_empty(), "{:?}", cool.failures);
    assert_eq!(cool.report.cancelled, None);
}

//! Behavioural tests for the forecast executor.
//!
//! Covers retry on transient failures, model reuse through the cache,
//! thermal deferral and cancellation, the concurrency bound, failure
//! isolation and the alignment invariant.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use power_core::types::{DataSeries, DataType, DateRange, MarketCatalog, MarketCode};
use power_forecast::admission::{CancelReason, FixedSensor, ScriptedSensor, SensorError, ThermalSensor};
use power_forecast::error::{ForecastFailure, ModelError, TaskErrorKind};
use power_forecast::executor::{ExecutorConfig, ForecastExecutor};
use power_forecast::features::{FeatureFrame, MarketInputs};
use power_forecast::model::{LinearModel, ModelParams, ModelProvider, RidgeRegressor};
use power_forecast::retry::RetryPolicy;
use power_scenarios::adjustment::Adjustment;
use power_scenarios::combiner::{combine, CombinerConfig};
use power_scenarios::variant::{AxisKind, ScenarioAxis, ScenarioVariant, VariantParams};
use power_scenarios::{CombinationId, ScenarioCombination};

/// Ridge regressor that fails `fit` transiently a fixed number of times and
/// tracks concurrent predictions.
#[derive(Default)]
struct InstrumentedProvider {
    transient_fit_failures: usize,
    fit_calls: AtomicUsize,
    predict_delay_ms: u64,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl InstrumentedProvider {
    fn failing(times: usize) -> Self {
        Self {
            transient_fit_failures: times,
            ..Self::default()
        }
    }

    fn slow(ms: u64) -> Self {
        Self {
            predict_delay_ms: ms,
            ..Self::default()
        }
    }
}

impl ModelProvider for InstrumentedProvider {
    type Model = LinearModel;

    fn name(&self) -> &str {
        "instrumented"
    }

    fn fit(&self, frame: &FeatureFrame, target: &[f64], params: &ModelParams) -> Result<LinearModel, ModelError> {
        let call = self.fit_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.transient_fit_failures {
            return Err(ModelError::transient_fit(format!("device busy (call {})", call)));
        }
        RidgeRegressor.fit(frame, target, params)
    }

    fn predict(&self, model: &LinearModel, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if self.predict_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.predict_delay_ms));
        }
        let out = RidgeRegressor.predict(model, frame);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

fn horizon() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
    )
    .unwrap()
}

fn series(market: MarketCode, dt: DataType, range: DateRange, f: impl Fn(usize) -> f64) -> DataSeries {
    let points = range
        .hourly_index()
        .into_iter()
        .enumerate()
        .map(|(i, ts)| (ts, f(i)))
        .collect();
    DataSeries::new(market, dt, points).unwrap()
}

/// Price = 20 + 0.5 * consumption on history; flat consumption projection.
fn inputs(market: MarketCode, with_projection: bool) -> MarketInputs {
    let window = horizon().preceding(14);
    let config = MarketCatalog::default_europe().get(market).unwrap().clone();
    let mut inputs = MarketInputs::new(config);
    let load = |i: usize| 100.0 + ((i * 13) % 40) as f64;
    inputs
        .history
        .insert(DataType::Consumption, series(market, DataType::Consumption, window, load));
    inputs.history.insert(
        DataType::Price,
        series(market, DataType::Price, window, move |i| 20.0 + 0.5 * load(i)),
    );
    if with_projection {
        inputs.projections.insert(
            DataType::Consumption,
            series(market, DataType::Consumption, horizon(), |_| 120.0),
        );
    }
    inputs
}

fn config(concurrency: usize, retry: RetryPolicy) -> ExecutorConfig {
    ExecutorConfig {
        concurrency,
        training_days: 14,
        drivers: vec![DataType::Consumption],
        model: ModelParams { ridge_penalty: 1e-6 },
        retry,
        poll_interval_ms: 1,
        max_thermal_wait_ms: 10_000,
        ..ExecutorConfig::default()
    }
}

/// Demand axis with `n` shift variants.
fn demand_combinations(n: usize) -> Vec<ScenarioCombination> {
    let variants = (0..n)
        .map(|i| {
            ScenarioVariant::new(
                format!("s{:02}", i),
                VariantParams::Manual,
                Adjustment::Shift { offset: i as f64 * 10.0 },
            )
        })
        .collect();
    let axis = ScenarioAxis::new("demand", AxisKind::Percentile, DataType::Consumption, variants).unwrap();
    combine(vec![axis], &[], &CombinerConfig::default())
        .unwrap()
        .into_combinations()
}

#[test]
fn test_two_transient_failures_then_success() {
    let provider = Arc::new(InstrumentedProvider::failing(2));
    let executor = ForecastExecutor::new(
        Arc::clone(&provider),
        Arc::new(FixedSensor(40.0)),
        config(1, RetryPolicy::immediate(3)),
    )
    .unwrap();
    let set = executor.run(&[inputs(MarketCode::De, true)], horizon(), &[ScenarioCombination::base()]);

    assert_eq!(set.len(), 1);
    assert!(set.failures().is_empty());
    assert_eq!(provider.fit_calls.load(Ordering::SeqCst), 3);
    let curve = set.get(&CombinationId::base(), MarketCode::De).unwrap();
    assert_eq!(curve.len(), 48);
    assert_relative_eq!(curve.values[0], 80.0, epsilon = 1e-3);
}

#[test]
fn test_four_failures_exceed_bound() {
    let provider = Arc::new(InstrumentedProvider::failing(4));
    let executor = ForecastExecutor::new(
        Arc::clone(&provider),
        Arc::new(FixedSensor(40.0)),
        config(1, RetryPolicy::immediate(3)),
    )
    .unwrap();
    let set = executor.run(&[inputs(MarketCode::De, true)], horizon(), &[ScenarioCombination::base()]);

    assert!(set.is_empty());
    assert_eq!(set.failures().len(), 1);
    match &set.failures()[0] {
        ForecastFailure::Task(e) => {
            assert_eq!(e.market, MarketCode::De);
            assert_eq!(e.kind, TaskErrorKind::ModelFit);
            assert_eq!(e.attempts, 3);
            assert!(e.transient);
        }
        other => panic!("unexpected failure {:?}", other),
    }
}

#[test]
fn test_combinations_share_one_trained_model() {
    let provider = Arc::new(InstrumentedProvider::default());
    let executor = ForecastExecutor::new(
        Arc::clone(&provider),
        Arc::new(FixedSensor(40.0)),
        config(4, RetryPolicy::default()),
    )
    .unwrap();
    let combos = demand_combinations(2);
    let set = executor.run(&[inputs(MarketCode::Fr, true)], horizon(), &combos);

    assert_eq!(set.len(), 2);
    let stats = executor.stats();
    assert_eq!(stats.trainings, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(provider.fit_calls.load(Ordering::SeqCst), 1);

    // The shifted scenario raises predicted price by 0.5 per unit of load.
    let low = set.get(combos[0].id(), MarketCode::Fr).unwrap();
    let high = set.get(combos[1].id(), MarketCode::Fr).unwrap();
    assert_relative_eq!(high.values[0] - low.values[0], 5.0, epsilon = 1e-3);
    assert_eq!(high.driver(DataType::Consumption).unwrap()[0], 130.0);
}

#[test]
fn test_thermal_deferral_then_admission() {
    let sensor = Arc::new(ScriptedSensor::new([90.0, 90.0, 50.0]));
    let mut cfg = config(1, RetryPolicy::default());
    cfg.thermal_ceiling_c = 80.0;
    let executor = ForecastExecutor::new(RidgeRegressor, sensor.clone(), cfg).unwrap();
    let set = executor.run(&[inputs(MarketCode::Nl, true)], horizon(), &[ScenarioCombination::base()]);

    assert_eq!(set.len(), 1);
    assert!(set.failures().is_empty());
    assert_eq!(executor.stats().admission.deferrals, 2);
    assert!(!executor.cancellation_token().is_cancelled());
}

#[test]
fn test_thermal_ceiling_cancels_run() {
    let mut cfg = config(2, RetryPolicy::default());
    cfg.thermal_ceiling_c = 80.0;
    cfg.max_thermal_wait_ms = 20;
    let executor = ForecastExecutor::new(RidgeRegressor, Arc::new(FixedSensor(99.0)), cfg).unwrap();
    let combos = demand_combinations(3);
    let set = executor.run(&[inputs(MarketCode::Be, true)], horizon(), &combos);

    assert!(set.is_empty());
    assert_eq!(set.failures().len(), 3);
    for failure in set.failures() {
        match failure {
            ForecastFailure::Task(e) => assert_eq!(e.kind, TaskErrorKind::Cancelled),
            other => panic!("unexpected failure {:?}", other),
        }
    }
    assert!(matches!(
        executor.last_cancellation(),
        Some(CancelReason::ThermalCeiling { .. })
    ));
}

/// Reads hot until switched to cool.
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
fn test_cancellation_does_not_carry_into_next_run() {
    let sensor = Arc::new(SwitchableSensor {
        hot: AtomicBool::new(true),
    });
    let mut cfg = config(1, RetryPolicy::default());
    cfg.thermal_ceiling_c = 85.0;
    cfg.max_thermal_wait_ms = 5;
    let executor = ForecastExecutor::new(RidgeRegressor, sensor.clone(), cfg).unwrap();

    let first = executor.run(&[inputs(MarketCode::De, true)], horizon(), &[ScenarioCombination::base()]);
    assert!(first.is_empty());
    assert_eq!(first.failures().len(), 1);
    assert!(matches!(
        executor.last_cancellation(),
        Some(CancelReason::ThermalCeiling { .. })
    ));
    assert!(!executor.cancellation_token().is_cancelled());

    sensor.hot.store(false, Ordering::SeqCst);
    let second = executor.run(&[inputs(MarketCode::De, true)], horizon(), &[ScenarioCombination::base()]);
    assert_eq!(second.len(), 1);
    assert!(second.failures().is_empty());
    assert_eq!(executor.last_cancellation(), None);
}

#[test]
fn test_external_cancellation_applies_to_one_run() {
    let executor =
        ForecastExecutor::new(RidgeRegressor, Arc::new(FixedSensor(20.0)), config(2, RetryPolicy::default())).unwrap();
    let token = executor.cancellation_token();
    token.cancel(CancelReason::External);
    let cancelled = executor.run(&[inputs(MarketCode::De, true)], horizon(), &demand_combinations(2));
    assert!(cancelled.is_empty());
    assert_eq!(executor.last_cancellation(), Some(CancelReason::External));

    let set = executor.run(&[inputs(MarketCode::De, true)], horizon(), &demand_combinations(2));
    assert_eq!(set.len(), 2);
    assert!(token.is_cancelled());
}

#[test]
fn test_external_cancellation_before_run() {
    let executor =
        ForecastExecutor::new(RidgeRegressor, Arc::new(FixedSensor(20.0)), config(2, RetryPolicy::default())).unwrap();
    executor.cancel();
    let set = executor.run(&[inputs(MarketCode::De, true)], horizon(), &demand_combinations(2));
    assert!(set.is_empty());
    assert_eq!(set.failures().len(), 2);
    assert_eq!(executor.stats().trainings, 0);
}

#[test]
fn test_concurrency_never_exceeds_limit() {
    let provider = Arc::new(InstrumentedProvider::slow(15));
    let executor = ForecastExecutor::new(
        Arc::clone(&provider),
        Arc::new(FixedSensor(40.0)),
        config(2, RetryPolicy::default()),
    )
    .unwrap();
    let set = executor.run(&[inputs(MarketCode::De, true)], horizon(), &demand_combinations(8));

    assert_eq!(set.len(), 8);
    assert!(provider.peak.load(Ordering::SeqCst) <= 2);
    assert!(executor.stats().admission.peak_in_flight <= 2);
}

#[test]
fn test_failed_market_does_not_affect_siblings() {
    let executor =
        ForecastExecutor::new(RidgeRegressor, Arc::new(FixedSensor(40.0)), config(2, RetryPolicy::default())).unwrap();
    let combos = demand_combinations(2);
    let set = executor.run(
        &[inputs(MarketCode::De, true), inputs(MarketCode::Fr, false)],
        horizon(),
        &combos,
    );

    assert_eq!(set.len(), 2);
    assert_eq!(set.markets(), vec![MarketCode::De]);
    assert_eq!(set.failures().len(), 2);
    for failure in set.failures() {
        assert_eq!(failure.market(), MarketCode::Fr);
        match failure {
            ForecastFailure::Task(e) => {
                assert_eq!(e.kind, TaskErrorKind::MalformedFeatures);
                assert_eq!(e.attempts, 0);
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }
}

#[test]
fn test_curves_of_a_market_share_the_horizon_index() {
    let executor =
        ForecastExecutor::new(RidgeRegressor, Arc::new(FixedSensor(40.0)), config(3, RetryPolicy::default())).unwrap();
    let set = executor.run(
        &[inputs(MarketCode::De, true), inputs(MarketCode::At, true)],
        horizon(),
        &demand_combinations(3),
    );
    assert_eq!(set.len(), 6);
    let expected = horizon().hourly_index();
    for curve in set.iter() {
        assert_eq!(&curve.timestamps[..], expected.as_slice());
        assert_relative_eq!(curve.weight, 1.0 / 3.0, epsilon = 1e-12);
    }
}

//! Run orchestration.
//!
//! The [`Orchestrator`] owns every component of a run and sequences them:
//!
//! 1. fetch training history and driver projections per market
//! 2. generate scenario axes (percentile axes fetch their own history)
//! 3. combine axes into a bounded, pruned combination set
//! 4. forecast every (market, combination) on the bounded executor
//! 5. derive spreads from the aggregated curve set
//!
//! Configuration problems fail the run before any task executes. Everything
//! else is isolated and itemised in [`RunOutput::failures`].

use std::sync::Arc;

use power_core::data::{CsvDirectoryProvider, DataError, DataProvider, FetchOptions, FreshnessGuard};
use power_core::types::{DataSeries, DataType, DateRange, MarketCatalog, MarketCode, MarketConfig};
use power_forecast::features::MarketInputs;
use power_forecast::model::{ModelProvider, RidgeRegressor};
use power_forecast::{
    CancellationToken, ExecutorConfig, FixedSensor, ForecastCurveSet, ForecastExecutor, SysinfoSensor, ThermalSensor,
};
use power_scenarios::combiner::CombinationInfo;
use power_scenarios::{
    combine, CombinationSet, LinearInterpolation, ScenarioAxis, ScenarioConfig, StatisticsProvider,
};
use power_spreads::{validate_all, SpreadCalculator, SpreadDefinition, SpreadResult};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{ConfigError, DataSource, RunConfig, SensorConfig};
use crate::error::{Failure, Result, ServiceError};
use crate::report::{stats_delta, RunReport};
use crate::synthetic::SyntheticProvider;

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Curves keyed by combination then market
    pub curves: ForecastCurveSet,
    /// Spread results in definition order
    pub spreads: Vec<SpreadResult>,
    /// Itemised failures of every stage
    pub failures: Vec<Failure>,
    /// Combinations that were forecast
    pub combinations: Vec<CombinationInfo>,
    /// Counts for the summary artifact
    pub report: RunReport,
}

/// Owns the data provider, scenario statistics, market catalog and executor.
pub struct Orchestrator<D: DataProvider, P: ModelProvider> {
    data: FreshnessGuard<D>,
    stats: Arc<dyn StatisticsProvider>,
    catalog: MarketCatalog,
    executor: ForecastExecutor<P>,
}

impl<D: DataProvider, P: ModelProvider> Orchestrator<D, P> {
    /// Creates an orchestrator.
    ///
    /// `freshness_hours` bounds the age of the newest point of every fetched
    /// series. Fails when the executor configuration is invalid.
    pub fn new(
        data: D,
        model: P,
        sensor: Arc<dyn ThermalSensor>,
        executor: ExecutorConfig,
        catalog: MarketCatalog,
        freshness_hours: i64,
    ) -> Result<Self> {
        Ok(Self {
            data: FreshnessGuard::new(data, freshness_hours),
            stats: Arc::new(LinearInterpolation),
            catalog,
            executor: ForecastExecutor::new(model, sensor, executor)?,
        })
    }

    /// Uses another percentile estimator.
    pub fn with_statistics(mut self, stats: Arc<dyn StatisticsProvider>) -> Self {
        self.stats = stats;
        self
    }

    /// Market conventions in use.
    pub fn catalog(&self) -> &MarketCatalog {
        &self.catalog
    }

    /// The forecast executor.
    pub fn executor(&self) -> &ForecastExecutor<P> {
        &self.executor
    }

    /// Token that cancels outstanding forecast tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.executor.cancellation_token()
    }

    fn fetch(&self, data_type: DataType, market: MarketCode, range: DateRange) -> std::result::Result<DataSeries, DataError> {
        self.data
            .fetch(data_type, market, range.start(), range.end(), &FetchOptions::default())
            .inspect_err(|e| {
                warn!(market = %market, data_type = %data_type, range = %range, error = %e, "Data request failed");
            })
    }

    /// Loads training history and horizon projections for each market.
    ///
    /// A market with any failed request is left out; its errors are returned.
    pub fn fetch_inputs(&self, markets: &[MarketCode], horizon: DateRange) -> (Vec<MarketInputs>, Vec<DataError>) {
        let config = self.executor.config();
        let window = horizon.preceding(config.training_days);
        let drivers = &config.drivers;

        let results: Vec<std::result::Result<MarketInputs, Vec<DataError>>> = markets
            .par_iter()
            .map(|&market| {
                let market_config = self
                    .catalog
                    .get(market)
                    .cloned()
                    .unwrap_or_else(|_| MarketConfig::new(market));
                let mut inputs = MarketInputs::new(market_config);
                let mut errors = Vec::new();
                for &dt in drivers.iter().chain(std::iter::once(&DataType::Price)) {
                    match self.fetch(dt, market, window) {
                        Ok(series) => {
                            inputs.history.insert(dt, series);
                        }
                        Err(e) => errors.push(e),
                    }
                }
                for &dt in drivers {
                    match self.fetch(dt, market, horizon) {
                        Ok(series) => {
                            inputs.projections.insert(dt, series);
                        }
                        Err(e) => errors.push(e),
                    }
                }
                if errors.is_empty() {
                    Ok(inputs)
                } else {
                    warn!(market = %market, failed_requests = errors.len(), "Market excluded from forecasting");
                    Err(errors)
                }
            })
            .collect();

        let mut inputs = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(i) => inputs.push(i),
                Err(e) => errors.extend(e),
            }
        }
        (inputs, errors)
    }

    /// Generates the configured axes for `markets` and combines them.
    ///
    /// Returns the combination set plus per-market generation failures. A
    /// market that some axis has no variants for is reported as
    /// [`Failure::Uncovered`] and must not be forecast. Unresolvable rules,
    /// an exceeded limit under the abort policy, and an axis that cannot be
    /// generated for any market are errors.
    pub fn prepare_combinations(
        &self,
        markets: &[MarketCode],
        horizon: DateRange,
        scenarios: &ScenarioConfig,
    ) -> Result<(CombinationSet, Vec<Failure>)> {
        let markets = distinct(markets);
        let markets = markets.as_slice();
        let built: Vec<Result<(ScenarioAxis, Vec<Failure>)>> = scenarios
            .axes
            .par_iter()
            .map(|spec| {
                let mut failures = Vec::new();
                let histories: Vec<DataSeries> = match spec.history_requirement() {
                    Some((data_type, lookback_days)) => {
                        let range = horizon.preceding(lookback_days);
                        markets
                            .iter()
                            .filter_map(|&m| match self.fetch(data_type, m, range) {
                                Ok(series) => Some(series),
                                Err(e) => {
                                    failures.push(Failure::Data(e));
                                    None
                                }
                            })
                            .collect()
                    }
                    None => Vec::new(),
                };
                let (axis, errors) = spec
                    .build(&histories, self.stats.as_ref())
                    .map_err(|source| ServiceError::Axis {
                        axis: spec.name().to_string(),
                        source,
                    })?;
                for e in errors {
                    warn!(axis = spec.name(), error = %e, "Scenario generation failed for a market");
                    failures.push(Failure::Scenario(e));
                }
                Ok((axis, failures))
            })
            .collect();

        let mut axes = Vec::with_capacity(built.len());
        let mut failures = Vec::new();
        for result in built {
            let (axis, axis_failures) = result?;
            axes.push(axis);
            failures.extend(axis_failures);
        }
        for &market in markets {
            if let Some(axis) = axes.iter().find(|a| !a.covers(market)) {
                warn!(market = %market, axis = axis.name(), "Market excluded from forecasting, axis lacks it");
                failures.push(Failure::Uncovered {
                    market,
                    axis: axis.name().to_string(),
                });
            }
        }
        let set = combine(axes, &scenarios.rules, &scenarios.combiner_config())?;
        Ok((set, failures))
    }

    fn check(&self, markets: &[MarketCode], scenarios: &ScenarioConfig, spreads: &[SpreadDefinition]) -> Result<()> {
        let mut problems = scenarios.validate();
        problems.extend(validate_all(spreads));
        if markets.is_empty() {
            problems.push("no markets requested".to_string());
        }
        for market in markets {
            if !self.catalog.contains(*market) {
                problems.push(format!("market {} is not in the catalog", market));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems).into())
        }
    }

    /// Forecasts `markets` over `horizon` under every scenario combination
    /// and derives `spreads`.
    ///
    /// Returns whatever succeeded plus an itemised failure list.
    pub fn get_forecast_curves(
        &self,
        markets: &[MarketCode],
        horizon: DateRange,
        scenarios: &ScenarioConfig,
        spreads: &[SpreadDefinition],
    ) -> Result<RunOutput> {
        let markets = distinct(markets);
        let markets = markets.as_slice();
        self.check(markets, scenarios, spreads)?;
        info!(
            markets = markets.len(),
            horizon = %horizon,
            axes = scenarios.axes.len(),
            spreads = spreads.len(),
            "Run started"
        );

        let mut report = RunReport::new(horizon, markets.to_vec());
        let (mut inputs, data_errors) = self.fetch_inputs(markets, horizon);
        let mut failures: Vec<Failure> = data_errors.into_iter().map(Failure::Data).collect();
        let loaded: Vec<MarketCode> = inputs.iter().map(MarketInputs::market).collect();

        if inputs.is_empty() {
            warn!("No market has usable inputs; nothing to forecast");
            let report = report.with_failures(&failures);
            report.log();
            return Ok(RunOutput {
                curves: ForecastCurveSet::default(),
                spreads: Vec::new(),
                failures,
                combinations: Vec::new(),
                report,
            });
        }

        let (set, scenario_failures) = self.prepare_combinations(&loaded, horizon, scenarios)?;
        let uncovered: Vec<MarketCode> = scenario_failures
            .iter()
            .filter_map(|f| match f {
                Failure::Uncovered { market, .. } => Some(*market),
                _ => None,
            })
            .collect();
        inputs.retain(|i| !uncovered.contains(&i.market()));
        failures.extend(scenario_failures);
        let available: Vec<MarketCode> = inputs.iter().map(MarketInputs::market).collect();

        let before = self.executor.stats();
        let curves = self.executor.run(&inputs, horizon, set.combinations());
        let (trainings, cache_hits, deferrals) = stats_delta(&before, &self.executor.stats());
        failures.extend(curves.failures().iter().cloned().map(Failure::Forecast));

        let spread_output = SpreadCalculator::new(self.catalog.clone()).compute(&curves, spreads);
        failures.extend(spread_output.missing.into_iter().map(Failure::Spread));

        report.forecast_markets = available;
        report.raw_combinations = set.raw_count();
        report.combinations = set.len();
        report.pruned = set.pruned();
        report.collapsed = set.collapsed();
        report.limit = set.outcome();
        report.curves = curves.len();
        report.spreads = spread_output.results.len();
        report.trainings = trainings;
        report.cache_hits = cache_hits;
        report.thermal_deferrals = deferrals;
        report.cancelled = self.executor.last_cancellation();
        let report = report.with_failures(&failures);
        report.log();

        Ok(RunOutput {
            curves,
            spreads: spread_output.results,
            failures,
            combinations: set.combinations().iter().map(|c| c.describe()).collect(),
            report,
        })
    }
}

/// `markets` without repeats, in first-seen order.
fn distinct(markets: &[MarketCode]) -> Vec<MarketCode> {
    let mut out: Vec<MarketCode> = Vec::with_capacity(markets.len());
    for &m in markets {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    out
}

/// Data provider selected by `config.data.source`.
pub fn data_provider(config: &RunConfig) -> Arc<dyn DataProvider> {
    match &config.data.source {
        DataSource::Csv { dir } => Arc::new(CsvDirectoryProvider::new(dir.clone())),
        DataSource::Synthetic { seed } => Arc::new(SyntheticProvider::new(*seed)),
    }
}

/// Thermal sensor selected by `config.sensor`.
pub fn thermal_sensor(config: &RunConfig) -> Arc<dyn ThermalSensor> {
    match config.sensor {
        SensorConfig::Sysinfo => Arc::new(SysinfoSensor::gpu()),
        SensorConfig::Fixed { celsius } => Arc::new(FixedSensor(celsius)),
    }
}

/// Orchestrator with the ridge regressor and the configured data source,
/// sensor, catalog and executor settings.
pub fn from_config(config: &RunConfig) -> Result<Orchestrator<Arc<dyn DataProvider>, RidgeRegressor>> {
    Orchestrator::new(
        data_provider(config),
        RidgeRegressor,
        thermal_sensor(config),
        config.executor.clone(),
        config.catalog(),
        config.data.freshness_hours,
    )
}

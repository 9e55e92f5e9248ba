//! Bounded forecast executor.
//!
//! Runs one task per (market, combination) pair on a dedicated rayon pool
//! sized to the configured concurrency. Each attempt of a task:
//!
//! 1. passes admission (concurrency permit, then thermal check),
//! 2. obtains the market's trained model from the single-flight cache,
//!    training it on a miss,
//! 3. predicts over the scenario-adjusted prediction frame.
//!
//! Attempts are wrapped in the executor's [`RetryPolicy`]. A failing task is
//! recorded as a [`ForecastTaskError`] and never affects its siblings.
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use power_forecast::admission::FixedSensor;
//! use power_forecast::executor::{ExecutorConfig, ForecastExecutor};
//! use power_forecast::model::RidgeRegressor;
//!
//! let config = ExecutorConfig { concurrency: 2, ..ExecutorConfig::default() };
//! let executor = ForecastExecutor::new(RidgeRegressor, Arc::new(FixedSensor(40.0)), config).unwrap();
//! assert_eq!(executor.config().concurrency, 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use power_core::types::{DataType, DateRange, MarketCode};
use power_scenarios::ScenarioCombination;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::admission::{
    AdmissionConfig, AdmissionController, AdmissionStats, CancelReason, CancellationToken, ThermalSensor,
};
use crate::aggregator::aggregate_with_reference;
use crate::cache::{CacheStats, ModelCache, ModelKey};
use crate::curve::{ForecastCurve, ForecastCurveSet};
use crate::error::{ExecutorError, FeatureError, ForecastTaskError, ModelError, Retryable};
use crate::features::{FeatureBuilder, MarketInputs};
use crate::model::{ModelParams, ModelProvider};
use crate::retry::{RetryFailure, RetryPolicy};

fn default_concurrency() -> usize {
    num_cpus::get().max(1)
}

/// Executor settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum concurrently admitted tasks
    pub concurrency: usize,
    /// Device temperature above which tasks are deferred
    pub thermal_ceiling_c: f64,
    /// Wait between temperature samples while deferred, in milliseconds
    pub poll_interval_ms: u64,
    /// Longest deferral before the run is cancelled, in milliseconds
    pub max_thermal_wait_ms: u64,
    /// Days of history preceding the horizon used for training
    pub training_days: u32,
    /// Driver series used as model features, in column order
    pub drivers: Vec<DataType>,
    /// Model hyperparameters
    pub model: ModelParams,
    /// Retry policy for transient task failures
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            thermal_ceiling_c: 85.0,
            poll_interval_ms: 500,
            max_thermal_wait_ms: 300_000,
            training_days: 90,
            drivers: DataType::DEFAULT_DRIVERS.to_vec(),
            model: ModelParams::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    /// Returns a list of problems, empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.concurrency == 0 {
            errors.push("executor.concurrency must be >= 1".to_string());
        }
        if !self.thermal_ceiling_c.is_finite() || self.thermal_ceiling_c <= 0.0 {
            errors.push(format!(
                "executor.thermal_ceiling_c must be positive, got {}",
                self.thermal_ceiling_c
            ));
        }
        if self.training_days == 0 {
            errors.push("executor.training_days must be >= 1".to_string());
        }
        if self.drivers.contains(&DataType::Price) {
            errors.push("executor.drivers may not include price (it is the target)".to_string());
        }
        let mut seen = self.drivers.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.drivers.len() {
            errors.push("executor.drivers contains duplicates".to_string());
        }
        errors.extend(self.model.validate());
        errors.extend(self.retry.validate());
        errors
    }

    /// Admission thresholds.
    pub fn admission(&self) -> AdmissionConfig {
        AdmissionConfig {
            thermal_ceiling_c: self.thermal_ceiling_c,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_thermal_wait: Duration::from_millis(self.max_thermal_wait_ms),
        }
    }
}

/// Counters across every run of one executor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ExecutorStats {
    /// Models trained (cache misses)
    pub trainings: usize,
    /// Model cache hits
    pub cache_hits: usize,
    /// Admission counters
    pub admission: AdmissionStats,
}

/// Error of a single attempt.
#[derive(Debug)]
enum AttemptError {
    Features(FeatureError),
    Model(ModelError),
    Cancelled(CancelReason),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Features(e) => fmt::Display::fmt(e, f),
            AttemptError::Model(e) => fmt::Display::fmt(e, f),
            AttemptError::Cancelled(r) => fmt::Display::fmt(r, f),
        }
    }
}

impl Retryable for AttemptError {
    fn is_transient(&self) -> bool {
        match self {
            AttemptError::Model(e) => e.is_transient(),
            AttemptError::Features(_) | AttemptError::Cancelled(_) => false,
        }
    }
}

/// Runs (market, combination) forecast tasks under a resource budget.
pub struct ForecastExecutor<P: ModelProvider> {
    provider: P,
    config: ExecutorConfig,
    features: FeatureBuilder,
    schema_hash: String,
    cache: Arc<ModelCache<P::Model>>,
    admission: AdmissionController,
    token: Mutex<CancellationToken>,
    last_cancellation: Mutex<Option<CancelReason>>,
    pool: rayon::ThreadPool,
}

impl<P: ModelProvider> ForecastExecutor<P> {
    /// Creates an executor. Fails on invalid configuration.
    pub fn new(provider: P, sensor: Arc<dyn ThermalSensor>, config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(ExecutorError::InvalidConfig(problems.join("; ")));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .thread_name(|i| format!("forecast-worker-{}", i))
            .build()?;
        let features = FeatureBuilder::new(config.drivers.clone());
        let schema_hash = features.schema_hash();
        let admission = AdmissionController::new(config.concurrency, sensor, config.admission());
        Ok(Self {
            provider,
            config,
            features,
            schema_hash,
            cache: Arc::new(ModelCache::new()),
            admission,
            token: Mutex::new(CancellationToken::new()),
            last_cancellation: Mutex::new(None),
            pool,
        })
    }

    /// Shares an existing model cache.
    pub fn with_cache(mut self, cache: Arc<ModelCache<P::Model>>) -> Self {
        self.cache = cache;
        self
    }

    /// Uses an externally owned cancellation token for the next run.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = token;
        self
    }

    /// Settings in use.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The model cache.
    pub fn cache(&self) -> &Arc<ModelCache<P::Model>> {
        &self.cache
    }

    /// Token cancelling the run in progress, or the next run when idle.
    ///
    /// A cancelled token is replaced with a fresh one when its run finishes.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Cancels outstanding tasks. In-flight attempts complete.
    pub fn cancel(&self) {
        if self.cancellation_token().cancel(CancelReason::External) {
            warn!("Forecast run cancelled externally");
        }
    }

    /// Why the most recent run was cancelled, if it was.
    pub fn last_cancellation(&self) -> Option<CancelReason> {
        self.last_cancellation.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Cumulative counters.
    pub fn stats(&self) -> ExecutorStats {
        let CacheStats { trainings, hits, .. } = self.cache.stats();
        ExecutorStats {
            trainings,
            cache_hits: hits,
            admission: self.admission.stats(),
        }
    }

    /// Forecasts every market under every combination over `horizon`.
    ///
    /// Always returns: succeeded curves plus one failure per failed task.
    pub fn run(
        &self,
        markets: &[MarketInputs],
        horizon: DateRange,
        combinations: &[ScenarioCombination],
    ) -> ForecastCurveSet {
        let token = self.cancellation_token();
        let window = horizon.preceding(self.config.training_days);
        let tasks: Vec<(&MarketInputs, &ScenarioCombination)> = markets
            .iter()
            .flat_map(|m| combinations.iter().map(move |c| (m, c)))
            .collect();
        info!(
            provider = self.provider.name(),
            markets = markets.len(),
            combinations = combinations.len(),
            tasks = tasks.len(),
            concurrency = self.config.concurrency,
            horizon = %horizon,
            training_window = %window,
            "Forecast run started"
        );

        let results: Vec<Result<ForecastCurve, ForecastTaskError>> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|(inputs, combination)| self.run_task(&token, inputs, combination, horizon, window))
                .collect()
        });

        let (curves, failures): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
        let curves: Vec<ForecastCurve> = curves.into_iter().filter_map(Result::ok).collect();
        let failures: Vec<ForecastTaskError> = failures.into_iter().filter_map(Result::err).collect();

        let index: Arc<[NaiveDateTime]> = horizon.hourly_index().into();
        let references: BTreeMap<MarketCode, Arc<[NaiveDateTime]>> = markets
            .iter().map(|m| (m.market(), Arc::clone(&index))).collect();
        let set = aggregate_with_reference(curves, failures, &references);

        let stats = self.stats();
        info!(
            curves = set.len(),
            failures = set.failures().len(),
            trainings = stats.trainings,
            cache_hits = stats.cache_hits,
            deferrals = stats.admission.deferrals,
            peak_in_flight = stats.admission.peak_in_flight,
            cancelled = token.is_cancelled(),
            "Forecast run finished"
        );

        let reason = token.reason();
        if reason.is_some() {
            *self.token.lock().unwrap_or_else(|e| e.into_inner()) = CancellationToken::new();
        }
        *self.last_cancellation.lock().unwrap_or_else(|e| e.into_inner()) = reason;
        set
    }

    fn run_task(
        &self,
        token: &CancellationToken,
        inputs: &MarketInputs,
        combination: &ScenarioCombination,
        horizon: DateRange,
        window: DateRange,
    ) -> Result<ForecastCurve, ForecastTaskError> {
        let market = inputs.market();
        let id = combination.id();
        let label = format!("{}/{}", market, id);

        let prediction = self.features.prediction(inputs, horizon, combination).map_err(|e| {
            warn!(market = %market, combination = %id, error = %e, "Forecast task failed permanently");
            ForecastTaskError::from_features(market, id.clone(), &e)
        })?;
        let key = ModelKey::new(market, window, self.schema_hash.clone());

        let outcome = self.config.retry.run(token, &label, |_attempt| {
            let _permit = self
                .admission
                .admit(token, &label)
                .map_err(AttemptError::Cancelled)?;

            let mut trained = false;
            let handle = self.cache.get_or_train(&key, || {
                trained = true;
                let training = self
                    .features
                    .training(inputs, window)
                    .map_err(AttemptError::Features)?;
                info!(
                    market = %market,
                    training_window = %window,
                    schema = &self.schema_hash[..12],
                    rows = training.frame.n_rows(),
                    "Model cache miss, training"
                );
                self.provider
                    .fit(&training.frame, &training.target, &self.config.model)
                    .map_err(AttemptError::Model)
            })?;
            if !trained {
                debug!(market = %market, combination = %id, "Model cache hit");
            }

            let values = self
                .provider
                .predict(&handle.model, &prediction.frame)
                .map_err(AttemptError::Model)?;
            if values.len() != prediction.frame.n_rows() {
                return Err(AttemptError::Model(ModelError::ShapeMismatch {
                    expected: prediction.frame.n_rows(),
                    actual: values.len(),
                }));
            }
            Ok(values)
        });

        match outcome {
            Ok((values, attempts)) => {
                debug!(market = %market, combination = %id, attempts, "Forecast task succeeded");
                Ok(ForecastCurve {
                    market,
                    combination: id.clone(),
                    timestamps: prediction.frame.shared_index(),
                    values,
                    drivers: prediction.drivers,
                    weight: combination.weight(),
                })
            }
            Err(failure) => {
                let error = match failure {
                    RetryFailure::Cancelled { reason, attempts } => {
                        ForecastTaskError::cancelled(market, id.clone(), attempts, reason.to_string())
                    }
                    RetryFailure::Exhausted {
                        error: AttemptError::Cancelled(reason),
                        attempts,
                    } => ForecastTaskError::cancelled(market, id.clone(), attempts.saturating_sub(1), reason.to_string()),
                    RetryFailure::Exhausted {
                        error: AttemptError::Features(e),
                        attempts,
                    } => ForecastTaskError {
                        attempts,
                        ..ForecastTaskError::from_features(market, id.clone(), &e)
                    },
                    RetryFailure::Exhausted {
                        error: AttemptError::Model(e),
                        attempts,
                    } => ForecastTaskError::from_model(market, id.clone(), attempts, &e),
                };
                warn!(
                    market = %market,
                    combination = %id,
                    kind = %error.kind,
                    attempts = error.attempts,
                    error = %error.message,
                    "Forecast task failed permanently"
                );
                Err(error)
            }
        }
    }
}

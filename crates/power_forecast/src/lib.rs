//! # power_forecast: Forecast execution
//!
//! ## Layer 3 (Execution) Role
//!
//! power_forecast turns market inputs and scenario combinations into price
//! curves. It provides:
//! - Feature frames (`features`): training and scenario-adjusted prediction frames
//! - The model capability (`model`): `ModelProvider` and the built-in ridge regressor
//! - A single-flight model cache (`cache`) keyed by market, training window and schema
//! - Retry with exponential backoff (`retry`)
//! - Resource admission (`admission`): concurrency permits, thermal ceiling, cancellation
//! - The bounded executor (`executor`) and the result aggregator (`aggregator`)
//! - Curves and curve sets (`curve`) plus the failure taxonomy (`error`)
//!
//! Every combination of one market shares a single trained model: scenario
//! adjustments only change prediction inputs, never the feature schema.
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use power_core::types::{DataSeries, DataType, DateRange, MarketCatalog, MarketCode};
//! use power_forecast::admission::FixedSensor;
//! use power_forecast::executor::{ExecutorConfig, ForecastExecutor};
//! use power_forecast::features::MarketInputs;
//! use power_forecast::model::RidgeRegressor;
//! use power_scenarios::ScenarioCombination;
//!
//! let horizon = DateRange::new(
//!     NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
//! )
//! .unwrap();
//! let window = horizon.preceding(7);
//! let series = |dt: DataType, range: DateRange, f: &dyn Fn(usize) -> f64| {
//!     let points = range.hourly_index().into_iter().enumerate().map(|(i, ts)| (ts, f(i))).collect();
//!     DataSeries::new(MarketCode::De, dt, points).unwrap()
//! };
//!
//! let config = MarketCatalog::default_europe().get(MarketCode::De).unwrap().clone();
//! let mut inputs = MarketInputs::new(config);
//! inputs.history.insert(DataType::Consumption, series(DataType::Consumption, window, &|i| (i % 24) as f64));
//! inputs.history.insert(DataType::Price, series(DataType::Price, window, &|i| 2.0 * (i % 24) as f64));
//! inputs.projections.insert(DataType::Consumption, series(DataType::Consumption, horizon, &|i| (i % 24) as f64));
//!
//! let exec_config = ExecutorConfig {
//!     concurrency: 1,
//!     training_days: 7,
//!     drivers: vec![DataType::Consumption],
//!     ..ExecutorConfig::default()
//! };
//! let executor = ForecastExecutor::new(RidgeRegressor, Arc::new(FixedSensor(40.0)), exec_config).unwrap();
//! let curves = executor.run(&[inputs], horizon, &[ScenarioCombination::base()]);
//! assert_eq!(curves.len(), 1);
//! assert!(curves.failures().is_empty());
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod admission;
pub mod aggregator;
pub mod cache;
pub mod curve;
pub mod error;
pub mod executor;
pub mod features;
pub mod model;
pub mod retry;

pub use admission::{CancelReason, CancellationToken, FixedSensor, SysinfoSensor, ThermalSensor};
pub use aggregator::{aggregate, aggregate_with_reference};
pub use cache::{ModelCache, ModelHandle, ModelKey};
pub use curve::{ForecastCurve, ForecastCurveSet};
pub use error::{
    AlignmentError, ExecutorError, FeatureError, ForecastFailure, ForecastTaskError, ModelError, Retryable,
    TaskErrorKind,
};
pub use executor::{ExecutorConfig, ExecutorStats, ForecastExecutor};
pub use features::{FeatureBuilder, FeatureFrame, MarketInputs};
pub use model::{ModelParams, ModelProvider, RidgeRegressor};
pub use retry::RetryPolicy;

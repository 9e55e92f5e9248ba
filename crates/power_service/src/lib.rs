//! # power_service: Run orchestration
//!
//! ## Service Layer Role
//!
//! power_service sequences the forecasting layers into one run and exposes
//! them to operators. It provides:
//! - Run configuration (`config`): TOML loading, `POWERCAST_*` overrides, validation
//! - The orchestrator (`orchestrator`): data, scenarios, forecasts, spreads
//! - Run artifacts (`artifacts`): curve and spread tables plus JSON summaries
//! - The run report (`report`) and the failure taxonomy (`error`)
//! - A seeded synthetic data provider (`synthetic`) for demos and tests
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use power_core::types::MarketCode;
//! use power_forecast::model::RidgeRegressor;
//! use power_forecast::FixedSensor;
//! use power_scenarios::ScenarioConfig;
//! use power_service::config::RunConfig;
//! use power_service::orchestrator::Orchestrator;
//! use power_service::synthetic::SyntheticProvider;
//!
//! let mut config = RunConfig::default();
//! config.executor.concurrency = 2;
//! config.executor.training_days = 14;
//! config.validate().unwrap();
//!
//! let orchestrator = Orchestrator::new(
//!     SyntheticProvider::new(3),
//!     RidgeRegressor,
//!     Arc::new(FixedSensor(45.0)),
//!     config.executor.clone(),
//!     config.catalog(),
//!     config.data.freshness_hours,
//! )
//! .unwrap();
//!
//! let horizon = config.horizon().unwrap();
//! let output = orchestrator
//!     .get_forecast_curves(&[MarketCode::De], horizon, &ScenarioConfig::default(), &[])
//!     .unwrap();
//! assert_eq!(output.curves.len(), 1);
//! assert!(output.failures.is_empty());
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod artifacts;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod synthetic;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigError, DataSource, RunConfig, SensorConfig};
    pub use crate::error::{Failure, ServiceError};
    pub use crate::orchestrator::{Orchestrator, RunOutput};
    pub use crate::report::RunReport;
    pub use crate::synthetic::SyntheticProvider;
}

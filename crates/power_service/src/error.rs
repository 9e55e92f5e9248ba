//! Error types for the powercast service.
//!
//! [`ServiceError`] aborts a run before any forecast task executes.
//! [`Failure`] is one itemised problem inside a run that otherwise completed.

use power_core::types::{DataType, MarketCode};
use power_core::DataError;
use power_forecast::{ExecutorError, ForecastFailure};
use power_scenarios::{CombinationError, CombinationId, ScenarioError};
use power_spreads::MissingInputError;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Service error type
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid rules or an exceeded limit under the abort policy
    #[error("Scenario combination error: {0}")]
    Combination(#[from] CombinationError),

    /// An axis could not be generated for any market
    #[error("Scenario axis '{axis}' could not be built: {source}")]
    Axis {
        /// Axis name
        axis: String,
        /// Underlying error
        #[source]
        source: ScenarioError,
    },

    /// Executor setup error
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV artifact error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON artifact error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, ServiceError>;

/// One problem recorded during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// A data request failed; the market was excluded from forecasting.
    Data(DataError),
    /// A scenario generator could not produce variants for a market.
    Scenario(ScenarioError),
    /// A market was left out of forecasting because an axis has no variants for it.
    Uncovered {
        /// Market excluded from the run
        market: MarketCode,
        /// First axis lacking the market
        axis: String,
    },
    /// A forecast task failed or its curve was excluded.
    Forecast(ForecastFailure),
    /// A spread was skipped for one combination.
    Spread(MissingInputError),
}

impl Failure {
    /// Pipeline stage the failure belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Failure::Data(_) => "data",
            Failure::Scenario(_) | Failure::Uncovered { .. } => "scenario",
            Failure::Forecast(ForecastFailure::Task(_)) => "forecast",
            Failure::Forecast(ForecastFailure::Alignment(_)) => "alignment",
            Failure::Spread(_) => "spread",
        }
    }

    /// Market concerned, when there is exactly one.
    pub fn market(&self) -> Option<MarketCode> {
        match self {
            Failure::Data(e) => Some(e.market()),
            Failure::Scenario(ScenarioError::InsufficientHistory { market, .. }) => Some(*market),
            Failure::Uncovered { market, .. } => Some(*market),
            Failure::Scenario(_) | Failure::Spread(_) => None,
            Failure::Forecast(f) => Some(f.market()),
        }
    }

    /// Data type concerned, for data and history failures.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Failure::Data(e) => Some(e.data_type()),
            Failure::Scenario(ScenarioError::InsufficientHistory { data_type, .. }) => Some(*data_type),
            _ => None,
        }
    }

    /// Combination concerned, for forecast and spread failures.
    pub fn combination(&self) -> Option<&CombinationId> {
        match self {
            Failure::Forecast(f) => Some(f.combination()),
            Failure::Spread(e) => Some(&e.combination),
            Failure::Data(_) | Failure::Scenario(_) | Failure::Uncovered { .. } => None,
        }
    }

    /// Flat record for reports.
    pub fn record(&self) -> FailureRecord {
        FailureRecord {
            stage: self.stage(),
            market: self.market(),
            data_type: self.data_type(),
            combination: self.combination().map(|c| c.to_string()),
            message: self.to_string(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Data(e) => write!(f, "{}", e),
            Failure::Scenario(e) => write!(f, "{}", e),
            Failure::Uncovered { market, axis } => {
                write!(f, "{} not forecast: axis '{}' has no variants for it", market, axis)
            }
            Failure::Forecast(e) => write!(f, "{}", e),
            Failure::Spread(e) => write!(f, "{}", e),
        }
    }
}

/// Serializable view of a [`Failure`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    /// Pipeline stage
    pub stage: &'static str,
    /// Market, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketCode>,
    /// Data type, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    /// Combination id, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combination: Option<String>,
    /// Human-readable description
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use power_spreads::MissingInput;

    #[test]
    fn test_error_display() {
        let err = ServiceError::from(ConfigError::Parse("bad toml".into()));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn test_failure_record() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let data = Failure::Data(DataError::unavailable(DataType::Wind, MarketCode::Be, d, d, "no file"));
        let record = data.record();
        assert_eq!(record.stage, "data");
        assert_eq!(record.market, Some(MarketCode::Be));
        assert_eq!(record.data_type, Some(DataType::Wind));
        assert!(record.combination.is_none());

        let spread = Failure::Spread(MissingInputError {
            spread: "de-fr".into(),
            combination: CombinationId::base(),
            input: MissingInput::Curve { market: MarketCode::Fr },
        });
        assert_eq!(spread.stage(), "spread");
        assert_eq!(spread.record().combination.as_deref(), Some("base"));

        let uncovered = Failure::Uncovered {
            market: MarketCode::Fr,
            axis: "demand".into(),
        };
        assert_eq!(uncovered.stage(), "scenario");
        assert_eq!(uncovered.market(), Some(MarketCode::Fr));
        assert_eq!(uncovered.to_string(), "FR not forecast: axis 'demand' has no variants for it");
    }
}

//! Error types for forecast execution.
//!
//! This module provides:
//! - `ModelError`: Failures of the fit/predict capability
//! - `FeatureError`: Failures while assembling a feature frame
//! - `ForecastTaskError`: A failed (market, combination) task
//! - `AlignmentError`: A curve whose index disagrees with its market's reference
//! - `ForecastFailure`: Any per-artifact failure recorded in a curve set
//! - `ExecutorError`: Executor construction errors

use std::fmt;

use chrono::NaiveDateTime;
use power_core::types::{DataType, MarketCode, SeriesError};
use power_scenarios::CombinationId;
use serde::Serialize;
use thiserror::Error;

/// Classification used by the retry policy.
pub trait Retryable {
    /// Returns true if another attempt may succeed.
    fn is_transient(&self) -> bool;
}

/// Errors from the model fit/predict capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Training failed.
    #[error("Model fit failed: {message}")]
    Fit {
        /// Provider message
        message: String,
        /// Whether a retry may succeed
        transient: bool,
    },

    /// Prediction failed.
    #[error("Model predict failed: {message}")]
    Predict {
        /// Provider message
        message: String,
        /// Whether a retry may succeed
        transient: bool,
    },

    /// Device or resource temporarily unavailable.
    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    /// Feature and label (or model and frame) shapes disagree.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected length or width
        expected: usize,
        /// Actual length or width
        actual: usize,
    },
}

impl ModelError {
    /// Transient fit failure.
    pub fn transient_fit(message: impl Into<String>) -> Self {
        ModelError::Fit {
            message: message.into(),
            transient: true,
        }
    }

    /// Deterministic fit failure.
    pub fn fit(message: impl Into<String>) -> Self {
        ModelError::Fit {
            message: message.into(),
            transient: false,
        }
    }

    /// Deterministic predict failure.
    pub fn predict(message: impl Into<String>) -> Self {
        ModelError::Predict {
            message: message.into(),
            transient: false,
        }
    }
}

impl Retryable for ModelError {
    fn is_transient(&self) -> bool {
        match self {
            ModelError::Fit { transient, .. } | ModelError::Predict { transient, .. } => *transient,
            ModelError::ResourceBusy(_) => true,
            ModelError::ShapeMismatch { .. } => false,
        }
    }
}

/// Errors while assembling a feature frame. Always deterministic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// A required driver series was not supplied.
    #[error("Missing {data_type} series for {market}")]
    MissingSeries {
        /// Market
        market: MarketCode,
        /// Missing series
        data_type: DataType,
    },

    /// A series could not be aligned onto the frame index.
    #[error("Cannot align {data_type} for {market}: {source}")]
    Alignment {
        /// Market
        market: MarketCode,
        /// Series being aligned
        data_type: DataType,
        /// Underlying error
        #[source]
        source: SeriesError,
    },

    /// A column holds a non-finite value or has the wrong length.
    #[error("Malformed column '{column}': {message}")]
    MalformedColumn {
        /// Column name
        column: String,
        /// Description
        message: String,
    },
}

/// What went wrong in a forecast task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// Feature frame could not be built
    MalformedFeatures,
    /// Feature/label or prediction length disagreed
    LengthMismatch,
    /// Training failed
    ModelFit,
    /// Prediction failed
    ModelPredict,
    /// Device busy on every attempt
    ResourceBusy,
    /// Stopped by cancellation before completing
    Cancelled,
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskErrorKind::MalformedFeatures => "malformed_features",
            TaskErrorKind::LengthMismatch => "length_mismatch",
            TaskErrorKind::ModelFit => "model_fit",
            TaskErrorKind::ModelPredict => "model_predict",
            TaskErrorKind::ResourceBusy => "resource_busy",
            TaskErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl From<&ModelError> for TaskErrorKind {
    fn from(e: &ModelError) -> Self {
        match e {
            ModelError::Fit { .. } => TaskErrorKind::ModelFit,
            ModelError::Predict { .. } => TaskErrorKind::ModelPredict,
            ModelError::ResourceBusy(_) => TaskErrorKind::ResourceBusy,
            ModelError::ShapeMismatch { .. } => TaskErrorKind::LengthMismatch,
        }
    }
}

/// A failed forecast task, tagged with market and combination.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Forecast task {market}/{combination} failed ({kind}) after {attempts} attempt(s): {message}")]
pub struct ForecastTaskError {
    /// Market
    pub market: MarketCode,
    /// Combination id
    pub combination: CombinationId,
    /// Failure class
    pub kind: TaskErrorKind,
    /// Attempts made (0 when the task never started)
    pub attempts: u32,
    /// Whether the final error was transient (retries exhausted)
    pub transient: bool,
    /// Last error message
    pub message: String,
}

impl ForecastTaskError {
    /// Task stopped by cancellation.
    pub fn cancelled(
        market: MarketCode,
        combination: CombinationId,
        attempts: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            market,
            combination,
            kind: TaskErrorKind::Cancelled,
            attempts,
            transient: false,
            message: reason.into(),
        }
    }

    /// Task failed on a model error.
    pub fn from_model(
        market: MarketCode,
        combination: CombinationId,
        attempts: u32,
        error: &ModelError,
    ) -> Self {
        Self {
            market,
            combination,
            kind: TaskErrorKind::from(error),
            attempts,
            transient: error.is_transient(),
            message: error.to_string(),
        }
    }

    /// Task failed while building features.
    pub fn from_features(market: MarketCode, combination: CombinationId, error: &FeatureError) -> Self {
        Self {
            market,
            combination,
            kind: TaskErrorKind::MalformedFeatures,
            attempts: 0,
            transient: false,
            message: error.to_string(),
        }
    }
}

/// Why a curve disagrees with its market's reference index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum AlignmentIssue {
    /// Different timestamps.
    IndexMismatch {
        /// Reference length
        expected_len: usize,
        /// Curve length
        actual_len: usize,
        /// First differing timestamp, if within both indices
        first_difference: Option<NaiveDateTime>,
    },
    /// A second curve for the same market and combination.
    Duplicate,
}

/// A curve excluded from the aggregate.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Curve {market}/{combination} excluded: {issue:?}")]
pub struct AlignmentError {
    /// Market
    pub market: MarketCode,
    /// Combination id
    pub combination: CombinationId,
    /// Problem found
    pub issue: AlignmentIssue,
}

/// A per-artifact failure recorded next to the successful curves.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForecastFailure {
    /// Task-level error
    #[error(transparent)]
    Task(ForecastTaskError),
    /// Alignment error
    #[error(transparent)]
    Alignment(AlignmentError),
}

impl ForecastFailure {
    /// Market the failure concerns.
    pub fn market(&self) -> MarketCode {
        match self {
            ForecastFailure::Task(e) => e.market,
            ForecastFailure::Alignment(e) => e.market,
        }
    }

    /// Combination the failure concerns.
    pub fn combination(&self) -> &CombinationId {
        match self {
            ForecastFailure::Task(e) => &e.combination,
            ForecastFailure::Alignment(e) => &e.combination,
        }
    }
}

/// Executor construction errors.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Configuration out of range.
    #[error("Invalid executor configuration: {0}")]
    InvalidConfig(String),

    /// Worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

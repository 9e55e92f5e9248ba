//! Error types for scenario generation and combination.
//!
//! This module provides:
//! - `ScenarioError`: Errors from generators and axis construction
//! - `CombinationError`: Configuration and limit errors from the combiner

use power_core::types::{DataType, MarketCode};
use thiserror::Error;

/// Errors raised while generating variants or assembling an axis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    /// Lookback window holds fewer observations than required.
    #[error("Insufficient {data_type} history for {market}: {available} observations, need {required}")]
    InsufficientHistory {
        /// Market whose history was examined
        market: MarketCode,
        /// Series category
        data_type: DataType,
        /// Minimum observations required
        required: usize,
        /// Observations present in the lookback window
        available: usize,
    },

    /// Generator parameters are out of range or inconsistent.
    #[error("Invalid parameters for axis '{axis}': {message}")]
    InvalidParameters {
        /// Axis being generated
        axis: String,
        /// Description of the problem
        message: String,
    },

    /// Axis definition is malformed (name, duplicate or empty variants).
    #[error("Invalid axis '{axis}': {message}")]
    InvalidAxis {
        /// Axis name as given
        axis: String,
        /// Description of the problem
        message: String,
    },
}

impl ScenarioError {
    /// Shorthand for `InvalidParameters`.
    pub fn params(axis: impl Into<String>, message: impl Into<String>) -> Self {
        ScenarioError::InvalidParameters {
            axis: axis.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the scenario combiner.
///
/// Everything except `LimitExceeded` is a configuration error and fatal
/// before any forecast task runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CombinationError {
    /// Two axes share a name.
    #[error("Duplicate axis name: {0}")]
    DuplicateAxis(String),

    /// A prune rule references an axis that is not active.
    #[error("Prune rule #{rule} references unknown axis '{axis}'")]
    UnknownAxis {
        /// Index of the rule in declaration order
        rule: usize,
        /// Axis name as written in the rule
        axis: String,
    },

    /// A prune rule references a variant the axis does not define.
    #[error("Prune rule #{rule} references unknown variant '{variant}' on axis '{axis}'")]
    UnknownVariant {
        /// Index of the rule in declaration order
        rule: usize,
        /// Axis name
        axis: String,
        /// Variant id as written in the rule
        variant: String,
    },

    /// A prune rule has an out-of-range parameter.
    #[error("Prune rule #{rule} is invalid: {message}")]
    InvalidRule {
        /// Index of the rule in declaration order
        rule: usize,
        /// Description of the problem
        message: String,
    },

    /// Raw product exceeds the configured maximum and the policy is abort.
    #[error("Scenario product of {raw} combinations exceeds the limit of {max}")]
    LimitExceeded {
        /// Size of the raw cross product
        raw: usize,
        /// Configured maximum
        max: usize,
    },

    /// The combination limit must allow at least one combination.
    #[error("max_combinations must be positive")]
    ZeroLimit,

    /// A combination id could not be decoded.
    #[error("Malformed combination id '{0}'")]
    MalformedId(String),
}

impl CombinationError {
    /// Returns true for errors that stem from configuration.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, CombinationError::LimitExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_history_display() {
        let err = ScenarioError::InsufficientHistory {
            market: MarketCode::De,
            data_type: DataType::Consumption,
            required: 168,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient consumption history for DE: 12 observations, need 168"
        );
    }

    #[test]
    fn test_limit_is_not_config_error() {
        assert!(!CombinationError::LimitExceeded { raw: 10, max: 5 }.is_config_error());
        assert!(CombinationError::DuplicateAxis("a".into()).is_config_error());
    }
}

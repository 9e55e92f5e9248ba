//! Error types for spread calculation.
//!
//! This module provides:
//! - `SpreadConfigError`: an invalid definition, fatal at configuration time
//! - `MissingInputError`: a (spread, combination) pair skipped for lack of input

use std::fmt;

use chrono::NaiveDateTime;
use power_core::types::{DataType, MarketCode};
use power_scenarios::CombinationId;
use serde::Serialize;
use thiserror::Error;

/// Invalid spread configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpreadConfigError {
    /// A definition's parameters are out of range.
    #[error("Invalid spread '{name}': {message}")]
    InvalidDefinition {
        /// Spread name
        name: String,
        /// Description
        message: String,
    },
}

/// What a skipped spread was missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "missing", rename_all = "snake_case")]
pub enum MissingInput {
    /// No curve for the market under this combination.
    Curve {
        /// Market
        market: MarketCode,
    },
    /// The curve carries no values for a driver.
    Driver {
        /// Market
        market: MarketCode,
        /// Driver
        data_type: DataType,
    },
    /// Legs do not share a timestamp index.
    MisalignedLegs {
        /// First leg whose index differs
        market: MarketCode,
    },
    /// The ratio denominator is zero.
    ZeroDenominator {
        /// First offending timestamp
        timestamp: NaiveDateTime,
    },
    /// Too few periods for the requested offset.
    Periods {
        /// Periods required
        needed: usize,
        /// Periods in the curve
        available: usize,
    },
}

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingInput::Curve { market } => write!(f, "no curve for {}", market),
            MissingInput::Driver { market, data_type } => write!(f, "no {} driver on the {} curve", data_type, market),
            MissingInput::MisalignedLegs { market } => write!(f, "{} curve index differs from the first leg", market),
            MissingInput::ZeroDenominator { timestamp } => write!(f, "zero denominator at {}", timestamp),
            MissingInput::Periods { needed, available } => {
                write!(f, "{} periods needed, {} available", needed, available)
            }
        }
    }
}

/// A spread not produced for one combination.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Spread '{spread}' skipped for {combination}: {input}")]
pub struct MissingInputError {
    /// Spread name
    pub spread: String,
    /// Combination id
    pub combination: CombinationId,
    /// Missing input
    pub input: MissingInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message() {
        let e = MissingInputError {
            spread: "de-fr".into(),
            combination: CombinationId::base(),
            input: MissingInput::Curve { market: MarketCode::Fr },
        };
        assert_eq!(e.to_string(), "Spread 'de-fr' skipped for base: no curve for FR");
    }
}

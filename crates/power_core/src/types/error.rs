//! Error types for structured error handling.
//!
//! This module provides:
//! - `SeriesError`: Errors from series construction and alignment
//! - `MarketError`: Errors from market code parsing and catalog lookups
//! - `DateRangeError`: Errors from horizon construction

use chrono::NaiveDateTime;
use thiserror::Error;

use super::market::MarketCode;

/// Errors raised while building or aligning a [`DataSeries`](super::DataSeries).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    /// Timestamps must be strictly increasing.
    #[error("Timestamps not strictly increasing at index {index} ({timestamp})")]
    NotIncreasing {
        /// Position of the offending point
        index: usize,
        /// Offending timestamp
        timestamp: NaiveDateTime,
    },

    /// Values must be finite.
    #[error("Non-finite value at {0}")]
    NonFinite(NaiveDateTime),

    /// Parallel vectors have different lengths.
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// No observation at or before the first requested timestamp.
    #[error("No observation at or before {0}")]
    LeadingGap(NaiveDateTime),
}

/// Market-related errors.
///
/// # Examples
/// ```
/// use power_core::types::MarketError;
///
/// let err = MarketError::UnknownMarket("XX".to_string());
/// assert_eq!(format!("{}", err), "Unknown market: XX");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// Unrecognised market code.
    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    /// Market is valid but has no configuration in the catalog.
    #[error("Market not configured: {0}")]
    NotConfigured(MarketCode),

    /// Unrecognised currency code.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Unrecognised data type.
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    /// Peak calendar hours are outside 0..=24 or inverted.
    #[error("Invalid peak calendar: {0}")]
    InvalidCalendar(String),
}

/// Horizon construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    /// End date precedes start date.
    #[error("Date range end {end} precedes start {start}")]
    Inverted {
        /// Requested start
        start: chrono::NaiveDate,
        /// Requested end
        end: chrono::NaiveDate,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_series_error_display() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        let err = SeriesError::NotIncreasing {
            index: 4,
            timestamp: ts,
        };
        assert_eq!(
            err.to_string(),
            "Timestamps not strictly increasing at index 4 (2025-01-01 03:00:00)"
        );
    }

    #[test]
    fn test_market_error_display() {
        let err = MarketError::NotConfigured(MarketCode::Pl);
        assert_eq!(err.to_string(), "Market not configured: PL");
    }

    #[test]
    fn test_date_range_error_display() {
        let err = DateRangeError::Inverted {
            start: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };
        assert!(err.to_string().contains("precedes"));
    }
}

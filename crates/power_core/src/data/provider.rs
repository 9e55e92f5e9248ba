//! The data access trait and its error type.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::types::{DataSeries, DataType, MarketCode, SeriesError};

/// Per-request options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Reference time for freshness checks.
    ///
    /// Defaults to the last delivery hour of the requested range.
    pub as_of: Option<NaiveDateTime>,
}

impl FetchOptions {
    /// Options with an explicit freshness reference time.
    pub fn as_of(ts: NaiveDateTime) -> Self {
        Self { as_of: Some(ts) }
    }
}

/// Errors from a single data request.
///
/// Reported per request; a failed request never aborts sibling requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// No source can supply the requested range.
    #[error("No {data_type} data for {market} between {start} and {end}: {reason}")]
    Unavailable {
        /// Requested category
        data_type: DataType,
        /// Requested market
        market: MarketCode,
        /// Requested first day
        start: NaiveDate,
        /// Requested last day
        end: NaiveDate,
        /// Source-specific explanation
        reason: String,
    },

    /// The newest available point is older than the freshness bound.
    #[error("Stale {data_type} data for {market}: last point {last} is more than {max_age_hours}h before {reference}")]
    Stale {
        /// Requested category
        data_type: DataType,
        /// Requested market
        market: MarketCode,
        /// Newest available timestamp
        last: NaiveDateTime,
        /// Reference time the age was measured against
        reference: NaiveDateTime,
        /// Configured bound in hours
        max_age_hours: i64,
    },

    /// The source returned data that violates series invariants.
    #[error("Malformed {data_type} data for {market}: {source}")]
    Malformed {
        /// Requested category
        data_type: DataType,
        /// Requested market
        market: MarketCode,
        /// Underlying series error
        #[source]
        source: SeriesError,
    },
}

impl DataError {
    /// Market the failed request was for.
    pub fn market(&self) -> MarketCode {
        match self {
            DataError::Unavailable { market, .. }
            | DataError::Stale { market, .. }
            | DataError::Malformed { market, .. } => *market,
        }
    }

    /// Data type the failed request was for.
    pub fn data_type(&self) -> DataType {
        match self {
            DataError::Unavailable { data_type, .. }
            | DataError::Stale { data_type, .. }
            | DataError::Malformed { data_type, .. } => *data_type,
        }
    }

    /// Shorthand for an `Unavailable` error.
    pub fn unavailable(
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        reason: impl Into<String>,
    ) -> Self {
        DataError::Unavailable {
            data_type,
            market,
            start,
            end,
            reason: reason.into(),
        }
    }
}

/// Supplier of time-aligned series.
///
/// `start` and `end` are inclusive delivery days; implementations return the
/// points in `[start 00:00, end + 1 day 00:00)`.
pub trait DataProvider: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Fetches one series.
    fn fetch(
        &self,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        opts: &FetchOptions,
    ) -> Result<DataSeries, DataError>;
}

impl<P: DataProvider + ?Sized> DataProvider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        opts: &FetchOptions,
    ) -> Result<DataSeries, DataError> {
        (**self).fetch(data_type, market, start, end, opts)
    }
}

//! Ordered, read-only time series.
//!
//! A [`DataSeries`] holds the observations of one `(market, data type)` pair.
//! Timestamps are strictly increasing and values are finite; both invariants
//! are checked once at construction. The series is immutable afterwards:
//! scenario adjustments produce a new series that shares the timestamp
//! buffer of the original.

use std::sync::Arc;

use chrono::NaiveDateTime;

use super::data_type::DataType;
use super::error::SeriesError;
use super::market::MarketCode;

/// Ordered sequence of `(timestamp, value)` for one market and data type.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use power_core::types::{DataSeries, DataType, MarketCode};
///
/// let t0 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let t1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(1, 0, 0).unwrap();
/// let series = DataSeries::new(MarketCode::De, DataType::Price, vec![(t0, 40.0), (t1, 42.0)]).unwrap();
/// assert_eq!(series.len(), 2);
/// assert_eq!(series.mean(), Some(41.0));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DataSeries {
    market: MarketCode,
    data_type: DataType,
    timestamps: Arc<[NaiveDateTime]>,
    values: Vec<f64>,
}

impl DataSeries {
    /// Builds a series from `(timestamp, value)` points.
    pub fn new(
        market: MarketCode,
        data_type: DataType,
        points: Vec<(NaiveDateTime, f64)>,
    ) -> Result<Self, SeriesError> {
        let (timestamps, values): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        Self::from_parts(market, data_type, timestamps, values)
    }

    /// Builds a series from parallel timestamp and value vectors.
    pub fn from_parts(
        market: MarketCode,
        data_type: DataType,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        if timestamps.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                expected: timestamps.len(),
                actual: values.len(),
            });
        }
        for (index, pair) in timestamps.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(SeriesError::NotIncreasing {
                    index: index + 1,
                    timestamp: pair[1],
                });
            }
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(SeriesError::NonFinite(timestamps[pos]));
        }
        Ok(Self {
            market,
            data_type,
            timestamps: timestamps.into(),
            values,
        })
    }

    /// Market the series belongs to.
    pub fn market(&self) -> MarketCode {
        self.market
    }

    /// Category of the series.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observation timestamps.
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Observation values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterates `(timestamp, value)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Earliest timestamp.
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    /// Latest timestamp.
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Value observed exactly at `ts`.
    pub fn value_at(&self, ts: NaiveDateTime) -> Option<f64> {
        self.timestamps
            .binary_search(&ts)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Arithmetic mean of the values.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Sub-series with timestamps in `[start, end_exclusive)`.
    pub fn window(&self, start: NaiveDateTime, end_exclusive: NaiveDateTime) -> DataSeries {
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t < end_exclusive).max(lo);
        DataSeries {
            market: self.market,
            data_type: self.data_type,
            timestamps: self.timestamps[lo..hi].into(),
            values: self.values[lo..hi].to_vec(),
        }
    }

    /// New series with the same timestamps and transformed values.
    ///
    /// The timestamp buffer is shared with `self`.
    pub fn map_values<F>(&self, mut f: F) -> DataSeries
    where
        F: FnMut(NaiveDateTime, f64) -> f64,
    {
        let values = self.iter().map(|(ts, v)| f(ts, v)).collect();
        DataSeries {
            market: self.market,
            data_type: self.data_type,
            timestamps: Arc::clone(&self.timestamps),
            values,
        }
    }

    /// Values aligned onto `index` by forward fill.
    ///
    /// Each target timestamp takes the latest observation at or before it.
    /// `index` must be sorted ascending. Fails with [`SeriesError::LeadingGap`]
    /// when no observation precedes the first target timestamp.
    pub fn reindex_ffill(&self, index: &[NaiveDateTime]) -> Result<Vec<f64>, SeriesError> {
        let mut out = Vec::with_capacity(index.len());
        let mut cursor = 0usize;
        let mut last: Option<f64> = None;
        for &target in index {
            while cursor < self.timestamps.len() && self.timestamps[cursor] <= target {
                last = Some(self.values[cursor]);
                cursor += 1;
            }
            match last {
                Some(v) => out.push(v),
                None => return Err(SeriesError::LeadingGap(target)),
            }
        }
        Ok(out)
    }
}

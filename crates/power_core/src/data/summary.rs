//! Descriptive statistics for loaded series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{DataSeries, DataType, MarketCode};

/// Count, coverage and range of one series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Market
    pub market: MarketCode,
    /// Data type
    pub data_type: DataType,
    /// Number of observations
    pub count: usize,
    /// First timestamp
    pub first: NaiveDateTime,
    /// Last timestamp
    pub last: NaiveDateTime,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
}

/// Summarises a series; `None` when it is empty.
pub fn summarize(series: &DataSeries) -> Option<SeriesSummary> {
    let first = series.first_timestamp()?;
    let last = series.last_timestamp()?;
    let mean = series.mean()?;
    let (min, max) = series
        .values()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    Some(SeriesSummary {
        market: series.market(),
        data_type: series.data_type(),
        count: series.len(),
        first,
        last,
        min,
        max,
        mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    #[test]
    fn test_summary_statistics() {
        let t = |h| {
            NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let series = DataSeries::new(
            MarketCode::Be,
            DataType::Solar,
            vec![(t(0), 0.0), (t(1), 5.0), (t(2), 10.0)],
        )
        .unwrap();
        let summary = summarize(&series).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.first, t(0));
        assert_eq!(summary.last, t(2));
        assert_relative_eq!(summary.min, 0.0);
        assert_relative_eq!(summary.max, 10.0);
        assert_relative_eq!(summary.mean, 5.0);
    }

    #[test]
    fn test_empty_series_has_no_summary() {
        let series = DataSeries::new(MarketCode::Be, DataType::Solar, vec![]).unwrap();
        assert!(summarize(&series).is_none());
    }
}

//! Freshness enforcement.

use chrono::{Duration, NaiveDate};

use super::provider::{DataError, DataProvider, FetchOptions};
use crate::types::{DataSeries, DateRange, DataType, MarketCode};

/// Wraps a provider and rejects series whose newest point is too old.
///
/// The age is measured from the last point to `opts.as_of`, or to the last
/// delivery hour of the requested range when no reference is given. An empty
/// result is reported as [`DataError::Unavailable`].
#[derive(Debug, Clone)]
pub struct FreshnessGuard<P> {
    inner: P,
    max_age: Duration,
}

impl<P: DataProvider> FreshnessGuard<P> {
    /// Wraps `inner` with a maximum age in hours.
    pub fn new(inner: P, max_age_hours: i64) -> Self {
        Self {
            inner,
            max_age: Duration::hours(max_age_hours.max(0)),
        }
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: DataProvider> DataProvider for FreshnessGuard<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(
        &self,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        opts: &FetchOptions,
    ) -> Result<DataSeries, DataError> {
        let series = self.inner.fetch(data_type, market, start, end, opts)?;
        let Some(last) = series.last_timestamp() else {
            return Err(DataError::unavailable(
                data_type,
                market,
                start,
                end,
                "source returned no observations",
            ));
        };
        let reference = match opts.as_of {
            Some(ts) => ts,
            None => match DateRange::new(start, end) {
                Ok(range) => range.last_hour(),
                Err(e) => {
                    return Err(DataError::unavailable(data_type, market, start, end, e.to_string()))
                }
            },
        };
        if reference - last > self.max_age {
            tracing::warn!(
                market = %market,
                data_type = %data_type,
                %last,
                %reference,
                "rejecting stale series"
            );
            return Err(DataError::Stale {
                data_type,
                market,
                last,
                reference,
                max_age_hours: self.max_age.num_hours(),
            });
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryProvider;
    use chrono::NaiveDateTime;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        d(day).and_hms_opt(hour, 0, 0).unwrap()
    }

    fn provider_with_points(points: Vec<(NaiveDateTime, f64)>) -> InMemoryProvider {
        let series = DataSeries::new(MarketCode::De, DataType::Gas, points).unwrap();
        InMemoryProvider::new().with_series(series)
    }

    #[test]
    fn test_fresh_series_passes() {
        let inner = provider_with_points(vec![(ts(1, 0), 30.0), (ts(2, 23), 31.0)]);
        let guard = FreshnessGuard::new(inner, 24);
        let series = guard
            .fetch(DataType::Gas, MarketCode::De, d(1), d(2), &FetchOptions::default())
            .unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_stale_series_rejected() {
        let inner = provider_with_points(vec![(ts(1, 0), 30.0)]);
        let guard = FreshnessGuard::new(inner, 12);
        let err = guard
            .fetch(DataType::Gas, MarketCode::De, d(1), d(3), &FetchOptions::default())
            .unwrap_err();
        assert!(matches!(err, DataError::Stale { max_age_hours: 12, .. }));
    }

    #[test]
    fn test_explicit_reference_time() {
        let inner = provider_with_points(vec![(ts(1, 0), 30.0)]);
        let guard = FreshnessGuard::new(inner, 12);
        let opts = FetchOptions::as_of(ts(1, 6));
        assert!(guard
            .fetch(DataType::Gas, MarketCode::De, d(1), d(3), &opts)
            .is_ok());
    }
}

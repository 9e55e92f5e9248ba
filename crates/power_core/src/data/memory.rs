//! In-memory data provider.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveTime};

use super::provider::{DataError, DataProvider, FetchOptions};
use crate::types::{DataSeries, DataType, MarketCode};

/// Provider backed by pre-loaded series.
///
/// `fetch` returns the window of the stored series covering the requested
/// days. A missing key or an empty window is [`DataError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<(MarketCode, DataType), DataSeries>,
}

impl InMemoryProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a series (builder style).
    pub fn with_series(mut self, series: DataSeries) -> Self {
        self.insert(series);
        self
    }

    /// Adds or replaces a series.
    pub fn insert(&mut self, series: DataSeries) {
        self.series
            .insert((series.market(), series.data_type()), series);
    }

    /// Number of stored series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(
        &self,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        _opts: &FetchOptions,
    ) -> Result<DataSeries, DataError> {
        let stored = self.series.get(&(market, data_type)).ok_or_else(|| {
            DataError::unavailable(data_type, market, start, end, "series not loaded")
        })?;
        let from = start.and_time(NaiveTime::MIN);
        let to = end.and_time(NaiveTime::MIN) + Duration::days(1);
        let window = stored.window(from, to);
        if window.is_empty() {
            return Err(DataError::unavailable(
                data_type,
                market,
                start,
                end,
                "no observations in range",
            ));
        }
        Ok(window)
    }
}

//! Forecast horizons.
//!
//! A [`DateRange`] is an inclusive range of delivery days. Its forecast index
//! is every delivery hour from `start 00:00` to `end 23:00`; every
//! `FeatureFrame` and `ForecastCurve` built for the same market and horizon
//! shares this index.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::error::DateRangeError;

/// Inclusive range of delivery days.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if end < start {
            return Err(DateRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// First delivery day.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last delivery day (inclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of delivery days.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// First delivery hour.
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// Exclusive upper bound (`end + 1 day, 00:00`).
    pub fn end_exclusive(&self) -> NaiveDateTime {
        self.start_datetime() + Duration::days(self.days())
    }

    /// Last delivery hour (`end 23:00`).
    pub fn last_hour(&self) -> NaiveDateTime {
        self.end_exclusive() - Duration::hours(1)
    }

    /// Returns whether the delivery hour `ts` falls within the range.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start_datetime() && ts < self.end_exclusive()
    }

    /// Every delivery hour in the range.
    pub fn hourly_index(&self) -> Vec<NaiveDateTime> {
        let hours = self.days() * 24;
        let start = self.start_datetime();
        (0..hours).map(|h| start + Duration::hours(h)).collect()
    }

    /// The `days` delivery days immediately before this range.
    ///
    /// Used to derive training and lookback windows. `days` is clamped to at least one.
    pub fn preceding(&self, days: u32) -> DateRange {
        let days = i64::from(days.max(1));
        let end = self.start - Duration::days(1);
        let start = self.start - Duration::days(days);
        DateRange { start, end }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

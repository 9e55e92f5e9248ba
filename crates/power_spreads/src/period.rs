//! Period bucketing for calendar and base-peak spreads.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use power_core::types::PeakCalendar;

use crate::definition::{Hours, Period};
use crate::error::MissingInput;

/// First day of the period containing `ts`.
pub fn period_start(period: Period, ts: NaiveDateTime) -> NaiveDate {
    let date = ts.date();
    match period {
        Period::Day => date,
        Period::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
        Period::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Mean value per period, ascending by period start.
///
/// `timestamps` must be ascending.
pub fn period_means(period: Period, timestamps: &[NaiveDateTime], values: &[f64]) -> Vec<(NaiveDate, f64)> {
    let mut out: Vec<(NaiveDate, f64, usize)> = Vec::new();
    for (ts, v) in timestamps.iter().zip(values) {
        let start = period_start(period, *ts);
        if out.last().map(|p| p.0) != Some(start) {
            out.push((start, 0.0, 0));
        }
        if let Some(p) = out.last_mut() {
            p.1 += v;
            p.2 += 1;
        }
    }
    out.into_iter().map(|(s, sum, n)| (s, sum / n as f64)).collect()
}

/// Mean of period `i + offset` minus mean of period `i`, stamped at the start of period `i`.
///
/// Only hours selected by `hours` under `calendar` enter the means; periods
/// left without any hour are not counted.
pub fn calendar_spread(
    period: Period,
    offset: u32,
    hours: Hours,
    calendar: &PeakCalendar,
    timestamps: &[NaiveDateTime],
    values: &[f64],
) -> Result<(Vec<NaiveDateTime>, Vec<f64>), MissingInput> {
    let (timestamps, values): (Vec<NaiveDateTime>, Vec<f64>) = timestamps
        .iter()
        .zip(values)
        .filter(|(ts, _)| hours.includes(calendar, **ts))
        .map(|(ts, v)| (*ts, *v))
        .unzip();
    let means = period_means(period, &timestamps, &values);
    let offset = offset.max(1) as usize;
    if means.len() <= offset {
        return Err(MissingInput::Periods {
            needed: offset + 1,
            available: means.len(),
        });
    }
    Ok(means
        .iter()
        .zip(&means[offset..])
        .map(|((start, near), (_, far))| (start.and_time(NaiveTime::MIN), far - near))
        .unzip())
}

/// Per-day mean of peak hours minus per-day mean of all hours.
///
/// Days without any peak hour (weekends under a weekday-only calendar) are skipped.
pub fn base_peak(calendar: &PeakCalendar, timestamps: &[NaiveDateTime], values: &[f64]) -> (Vec<NaiveDateTime>, Vec<f64>) {
    // (day, base sum, base count, peak sum, peak count)
    let mut days: Vec<(NaiveDate, f64, usize, f64, usize)> = Vec::new();
    for (ts, v) in timestamps.iter().zip(values) {
        let day = ts.date();
        if days.last().map(|d| d.0) != Some(day) {
            days.push((day, 0.0, 0, 0.0, 0));
        }
        if let Some(d) = days.last_mut() {
            d.1 += v;
            d.2 += 1;
            if calendar.is_peak(*ts) {
                d.3 += v;
                d.4 += 1;
            }
        }
    }
    days.into_iter()
        .filter(|d| d.4 > 0)
        .map(|(day, bs, bn, ps, pn)| (day.and_time(NaiveTime::MIN), ps / pn as f64 - bs / bn as f64))
        .unzip()
}

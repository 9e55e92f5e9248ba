//! Series adjustments carried by scenario variants.
//!
//! An [`Adjustment`] is a pure function over a [`DataSeries`]: applying it
//! never mutates the input and always returns a series on the same timestamp
//! index. The set of adjustment shapes is closed:
//!
//! - `Identity`: leave the series unchanged
//! - `Shift`: add a constant offset
//! - `Derate`: one or more capacity outages over sub-periods, applied in order
//! - `FuelShock`: percentage or absolute price shock, as a level or a ramp
//! - `PerMarket`: a different adjustment per market (identity for absent ones)

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use power_core::types::{DataSeries, MarketCode};
use serde::{Deserialize, Serialize};

/// How an outage reduces the affected series.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Derate {
    /// Multiply by `remaining` (0.0 = full outage, 1.0 = no outage).
    Multiplicative {
        /// Fraction of capacity that stays available
        remaining: f64,
    },
    /// Subtract `mw`, floored at zero.
    Additive {
        /// Capacity removed in MW
        mw: f64,
    },
}

impl Derate {
    fn apply(&self, value: f64) -> f64 {
        match *self {
            Derate::Multiplicative { remaining } => value * remaining,
            Derate::Additive { mw } => (value - mw).max(0.0),
        }
    }
}

/// One outage over an optional sub-period `[from, until)`.
///
/// Open bounds extend to the start or end of the series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outage {
    /// First affected hour (inclusive)
    #[serde(default)]
    pub from: Option<NaiveDateTime>,
    /// First unaffected hour (exclusive)
    #[serde(default)]
    pub until: Option<NaiveDateTime>,
    /// Reduction applied inside the period
    pub derate: Derate,
}

impl Outage {
    /// Outage over the whole series.
    pub fn whole(derate: Derate) -> Self {
        Self {
            from: None,
            until: None,
            derate,
        }
    }

    /// Outage over `[from, until)`.
    pub fn between(from: NaiveDateTime, until: NaiveDateTime, derate: Derate) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
            derate,
        }
    }

    /// Returns whether `ts` lies inside the outage period.
    pub fn covers(&self, ts: NaiveDateTime) -> bool {
        self.from.map_or(true, |f| ts >= f) && self.until.map_or(true, |u| ts < u)
    }
}

/// Shock size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ShockSize {
    /// Relative change in percent (`20.0` = +20%).
    Percent(f64),
    /// Absolute change in series units.
    Absolute(f64),
}

/// Shape of a shock over time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShockProfile {
    /// Full shock from the first hour.
    Level,
    /// Zero before `start`, linear to full at `end`, full afterwards.
    Ramp {
        /// Ramp begins
        start: NaiveDateTime,
        /// Ramp reaches the full shock
        end: NaiveDateTime,
    },
}

impl ShockProfile {
    /// Fraction of the shock in force at `ts`.
    pub fn fraction(&self, ts: NaiveDateTime) -> f64 {
        match *self {
            ShockProfile::Level => 1.0,
            ShockProfile::Ramp { start, end } => {
                if ts <= start {
                    0.0
                } else if ts >= end {
                    1.0
                } else {
                    let total = (end - start).num_seconds() as f64;
                    let elapsed = (ts - start).num_seconds() as f64;
                    elapsed / total
                }
            }
        }
    }
}

/// Fuel or carbon price shock.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelShock {
    /// Size of the full shock
    pub size: ShockSize,
    /// Time profile
    pub profile: ShockProfile,
}

impl FuelShock {
    fn apply(&self, ts: NaiveDateTime, value: f64) -> f64 {
        let frac = self.profile.fraction(ts);
        match self.size {
            ShockSize::Percent(pct) => value * (1.0 + pct / 100.0 * frac),
            ShockSize::Absolute(delta) => value + delta * frac,
        }
    }
}

/// Transformation of one driver series under a scenario variant.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use power_core::types::{DataSeries, DataType, MarketCode};
/// use power_scenarios::adjustment::Adjustment;
///
/// let t = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let base = DataSeries::new(MarketCode::De, DataType::Consumption, vec![(t, 50.0)]).unwrap();
/// let shifted = Adjustment::Shift { offset: 2.5 }.apply(MarketCode::De, &base);
/// assert_eq!(shifted.values(), &[52.5]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    /// No change.
    Identity,
    /// Constant additive offset.
    Shift {
        /// Offset in series units
        offset: f64,
    },
    /// Stacked outages applied in declaration order.
    Derate {
        /// Outages making up the variant
        outages: Vec<Outage>,
    },
    /// Fuel or carbon price shock.
    FuelShock(FuelShock),
    /// Market-specific adjustments.
    PerMarket {
        /// Adjustment per market
        by_market: BTreeMap<MarketCode, Adjustment>,
    },
}

impl Adjustment {
    /// Applies the adjustment to `series` as seen from `market`.
    pub fn apply(&self, market: MarketCode, series: &DataSeries) -> DataSeries {
        match self {
            Adjustment::Identity => series.clone(),
            Adjustment::Shift { offset } => series.map_values(|_, v| v + offset),
            Adjustment::Derate { outages } => series.map_values(|ts, v| {
                outages
                    .iter()
                    .filter(|o| o.covers(ts))
                    .fold(v, |acc, o| o.derate.apply(acc))
            }),
            Adjustment::FuelShock(shock) => series.map_values(|ts, v| shock.apply(ts, v)),
            Adjustment::PerMarket { by_market } => match by_market.get(&market) {
                Some(inner) => inner.apply(market, series),
                None => series.clone(),
            },
        }
    }

    /// Whether the adjustment was defined for `market`.
    ///
    /// Only per-market adjustments can lack a market; applying one to a
    /// market it does not cover leaves the series unchanged.
    pub fn covers(&self, market: MarketCode) -> bool {
        match self {
            Adjustment::PerMarket { by_market } => by_market.get(&market).is_some_and(|a| a.covers(market)),
            _ => true,
        }
    }

    /// Returns true if the adjustment leaves every series unchanged.
    pub fn is_identity(&self) -> bool {
        match self {
            Adjustment::Identity => true,
            Adjustment::Shift { offset } => *offset == 0.0,
            Adjustment::Derate { outages } => outages.is_empty(),
            Adjustment::FuelShock(_) => false,
            Adjustment::PerMarket { by_market } => by_market.values().all(Adjustment::is_identity),
        }
    }
}

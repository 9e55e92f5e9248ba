//! Market identities, currency conventions and trading calendars.
//!
//! The market set is closed: every bidding zone the system forecasts is a
//! variant of [`MarketCode`]. Per-market conventions live in an immutable
//! [`MarketCatalog`] that is built once per run and passed explicitly to the
//! components that need it.
//!
//! # Examples
//!
//! ```
//! use power_core::types::{MarketCatalog, MarketCode};
//!
//! let de: MarketCode = "de".parse().unwrap();
//! assert_eq!(de, MarketCode::De);
//! assert_eq!(de.code(), "DE");
//!
//! let catalog = MarketCatalog::default_europe();
//! assert!(catalog.get(MarketCode::Fr).unwrap().spread_partners.contains(&MarketCode::De));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use super::error::MarketError;

/// European power bidding zones supported by the forecaster.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketCode {
    /// Germany-Luxembourg
    De,
    /// France
    Fr,
    /// Netherlands
    Nl,
    /// Belgium
    Be,
    /// Austria
    At,
    /// Switzerland
    Ch,
    /// Poland
    Pl,
    /// Czech Republic
    Cz,
    /// Denmark West
    Dk1,
    /// Norway South-West
    No2,
    /// Sweden Central
    Se3,
    /// Italy North
    Itn,
}

impl MarketCode {
    /// All supported markets in declaration order.
    pub const ALL: [MarketCode; 12] = [
        MarketCode::De,
        MarketCode::Fr,
        MarketCode::Nl,
        MarketCode::Be,
        MarketCode::At,
        MarketCode::Ch,
        MarketCode::Pl,
        MarketCode::Cz,
        MarketCode::Dk1,
        MarketCode::No2,
        MarketCode::Se3,
        MarketCode::Itn,
    ];

    /// Returns the upper-case market code.
    pub fn code(&self) -> &'static str {
        match self {
            MarketCode::De => "DE",
            MarketCode::Fr => "FR",
            MarketCode::Nl => "NL",
            MarketCode::Be => "BE",
            MarketCode::At => "AT",
            MarketCode::Ch => "CH",
            MarketCode::Pl => "PL",
            MarketCode::Cz => "CZ",
            MarketCode::Dk1 => "DK1",
            MarketCode::No2 => "NO2",
            MarketCode::Se3 => "SE3",
            MarketCode::Itn => "ITN",
        }
    }

    /// Settlement currency of the day-ahead auction.
    pub fn currency(&self) -> Currency {
        match self {
            MarketCode::Ch => Currency::Chf,
            MarketCode::Pl => Currency::Pln,
            MarketCode::Cz => Currency::Czk,
            _ => Currency::Eur,
        }
    }
}

impl fmt::Display for MarketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MarketCode {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        MarketCode::ALL
            .iter()
            .copied()
            .find(|m| m.code() == upper)
            .ok_or_else(|| MarketError::UnknownMarket(s.to_string()))
    }
}

/// Settlement currencies of the supported markets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Euro
    Eur,
    /// Swiss Franc
    Chf,
    /// Polish Zloty
    Pln,
    /// Czech Koruna
    Czk,
}

impl Currency {
    /// Returns the ISO 4217 three-letter code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Chf => "CHF",
            Currency::Pln => "PLN",
            Currency::Czk => "CZK",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "CHF" => Ok(Currency::Chf),
            "PLN" => Ok(Currency::Pln),
            "CZK" => Ok(Currency::Czk),
            _ => Err(MarketError::UnknownCurrency(s.to_string())),
        }
    }
}

/// Peak/base hour definition for a market.
///
/// Hours in `[peak_start_hour, peak_end_hour)` are peak; every hour is base.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakCalendar {
    /// First peak hour (inclusive, 0-23)
    pub peak_start_hour: u32,
    /// End of the peak block (exclusive, 1-24)
    pub peak_end_hour: u32,
    /// Restrict peak hours to Monday-Friday
    pub weekdays_only: bool,
}

impl Default for PeakCalendar {
    fn default() -> Self {
        Self {
            peak_start_hour: 8,
            peak_end_hour: 20,
            weekdays_only: true,
        }
    }
}

impl PeakCalendar {
    /// Creates a validated calendar.
    pub fn new(peak_start_hour: u32, peak_end_hour: u32, weekdays_only: bool) -> Result<Self, MarketError> {
        let calendar = Self {
            peak_start_hour,
            peak_end_hour,
            weekdays_only,
        };
        calendar.validate()?;
        Ok(calendar)
    }

    /// Checks the hour bounds.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.peak_end_hour > 24 || self.peak_start_hour >= self.peak_end_hour {
            return Err(MarketError::InvalidCalendar(format!(
                "peak hours [{}, {}) must satisfy 0 <= start < end <= 24",
                self.peak_start_hour, self.peak_end_hour
            )));
        }
        Ok(())
    }

    /// Returns whether the delivery hour starting at `ts` is a peak hour.
    pub fn is_peak(&self, ts: NaiveDateTime) -> bool {
        if self.weekdays_only && is_weekend(ts) {
            return false;
        }
        let hour = ts.hour();
        hour >= self.peak_start_hour && hour < self.peak_end_hour
    }
}

/// Returns whether `ts` falls on a Saturday or Sunday.
pub fn is_weekend(ts: NaiveDateTime) -> bool {
    matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Immutable conventions for a single market.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Market identity
    pub code: MarketCode,
    /// Settlement currency
    pub currency: Currency,
    /// Peak/base hour definition
    #[serde(default)]
    pub calendar: PeakCalendar,
    /// Markets this one is typically spread against
    #[serde(default)]
    pub spread_partners: Vec<MarketCode>,
}

impl MarketConfig {
    /// Creates a configuration with the market's default currency and calendar.
    pub fn new(code: MarketCode) -> Self {
        Self {
            code,
            currency: code.currency(),
            calendar: PeakCalendar::default(),
            spread_partners: Vec::new(),
        }
    }

    /// Sets the spread partners.
    pub fn with_partners(mut self, partners: impl IntoIterator<Item = MarketCode>) -> Self {
        self.spread_partners = partners.into_iter().collect();
        self
    }

    /// Sets the peak calendar.
    pub fn with_calendar(mut self, calendar: PeakCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Price unit, e.g. `EUR/MWh`.
    pub fn unit(&self) -> String {
        format!("{}/MWh", self.currency.code())
    }
}

/// Immutable lookup of market conventions, constructed once per run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarketCatalog {
    markets: BTreeMap<MarketCode, MarketConfig>,
}

impl MarketCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every supported market and its usual interconnected partners.
    pub fn default_europe() -> Self {
        use MarketCode::*;
        let entries = [
            (De, vec![Fr, Nl, Be, At, Ch, Pl, Cz, Dk1, Se3, No2]),
            (Fr, vec![De, Be, Ch, Itn]),
            (Nl, vec![De, Be, Dk1, No2]),
            (Be, vec![Fr, Nl, De]),
            (At, vec![De, Ch, Cz, Itn]),
            (Ch, vec![De, Fr, At, Itn]),
            (Pl, vec![De, Cz, Se3]),
            (Cz, vec![De, At, Pl]),
            (Dk1, vec![De, Nl, No2, Se3]),
            (No2, vec![Dk1, Nl, De]),
            (Se3, vec![Dk1, Pl, De]),
            (Itn, vec![Fr, Ch, At]),
        ];
        entries
            .into_iter()
            .fold(Self::new(), |catalog, (code, partners)| {
                catalog.with_market(MarketConfig::new(code).with_partners(partners))
            })
    }

    /// Adds or replaces a market configuration.
    pub fn with_market(mut self, config: MarketConfig) -> Self {
        self.markets.insert(config.code, config);
        self
    }

    /// Looks up a market.
    pub fn get(&self, code: MarketCode) -> Result<&MarketConfig, MarketError> {
        self.markets
            .get(&code)
            .ok_or(MarketError::NotConfigured(code))
    }

    /// Returns whether the market is configured.
    pub fn contains(&self, code: MarketCode) -> bool {
        self.markets.contains_key(&code)
    }

    /// Iterates configured markets in code order.
    pub fn iter(&self) -> impl Iterator<Item = &MarketConfig> {
        self.markets.values()
    }

    /// Number of configured markets.
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Returns true when no market is configured.
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

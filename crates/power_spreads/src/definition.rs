//! Spread definitions.
//!
//! A closed set of spread kinds, each carrying its own name and the markets
//! it reads. Definitions are plain configuration values:
//!
//! ```toml
//! [[spreads]]
//! kind = "inter_market"
//! name = "de-fr"
//! long = "DE"
//! short = "FR"
//!
//! [[spreads]]
//! kind = "clean_spark"
//! name = "de-css"
//! market = "DE"
//! efficiency = 0.5
//! carbon_intensity = 0.37
//!
//! [[spreads]]
//! kind = "calendar"
//! name = "de-week-ahead"
//! market = "DE"
//! period = "week"
//! hours = "peak"
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use power_core::types::{DataType, MarketCode, PeakCalendar};
use serde::{Deserialize, Serialize};

use crate::error::SpreadConfigError;

/// Arithmetic between two price curves.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadOp {
    /// long − short
    #[default]
    Difference,
    /// long / short
    Ratio,
}

/// Resampling period of a calendar spread.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Delivery day
    Day,
    /// ISO week starting Monday
    Week,
    /// Calendar month
    Month,
}

/// Hours of each period that a calendar spread averages.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hours {
    /// Every hour
    #[default]
    Base,
    /// Peak hours of the market's calendar
    Peak,
    /// Hours outside the market's peak calendar
    OffPeak,
}

impl Hours {
    /// Whether `ts` is averaged under `calendar`.
    pub fn includes(self, calendar: &PeakCalendar, ts: NaiveDateTime) -> bool {
        match self {
            Hours::Base => true,
            Hours::Peak => calendar.is_peak(ts),
            Hours::OffPeak => !calendar.is_peak(ts),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        })
    }
}

/// One term of a weighted sum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpreadLeg {
    /// Market whose curve is read
    pub market: MarketCode,
    /// Scenario-adjusted driver to read instead of the price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DataType>,
    /// Conversion factor applied to the leg
    pub weight: f64,
}

impl SpreadLeg {
    /// Price leg.
    pub fn price(market: MarketCode, weight: f64) -> Self {
        Self {
            market,
            driver: None,
            weight,
        }
    }

    /// Driver leg.
    pub fn driver(market: MarketCode, driver: DataType, weight: f64) -> Self {
        Self {
            market,
            driver: Some(driver),
            weight,
        }
    }
}

fn default_offset() -> u32 {
    1
}

/// A derived series over forecast curves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpreadDefinition {
    /// Per-timestamp difference or ratio between two markets.
    InterMarket {
        /// Spread name
        name: String,
        /// Long leg
        long: MarketCode,
        /// Short leg
        short: MarketCode,
        /// Arithmetic
        #[serde(default)]
        op: SpreadOp,
    },
    /// `constant + Σ weight · leg` per timestamp.
    WeightedSum {
        /// Spread name
        name: String,
        /// Terms
        legs: Vec<SpreadLeg>,
        /// Constant term
        #[serde(default)]
        constant: f64,
    },
    /// `price − gas / efficiency − carbon · carbon_intensity`.
    CleanSpark {
        /// Spread name
        name: String,
        /// Market whose price, gas and carbon curves are read
        market: MarketCode,
        /// Thermal efficiency in (0, 1]
        efficiency: f64,
        /// Emission factor, tonnes CO2 per MWh of electricity
        carbon_intensity: f64,
    },
    /// Hourly value of transmission capacity: `max(to − from, 0) · capacity_mw`.
    Capacity {
        /// Spread name
        name: String,
        /// Exporting market
        from: MarketCode,
        /// Importing market
        to: MarketCode,
        /// Interconnector capacity
        capacity_mw: f64,
    },
    /// Mean of period `i + offset` minus mean of period `i` for one market.
    ///
    /// Periods without any selected hour are dropped before offsetting.
    Calendar {
        /// Spread name
        name: String,
        /// Market
        market: MarketCode,
        /// Bucketing period
        period: Period,
        /// Period offset, at least one
        #[serde(default = "default_offset")]
        offset: u32,
        /// Hours averaged within each period
        #[serde(default)]
        hours: Hours,
    },
    /// Daily peak-hour mean minus daily all-hour mean.
    BasePeak {
        /// Spread name
        name: String,
        /// Market whose calendar defines peak hours
        market: MarketCode,
    },
}

impl SpreadDefinition {
    /// Spread name.
    pub fn name(&self) -> &str {
        match self {
            SpreadDefinition::InterMarket { name, .. }
            | SpreadDefinition::WeightedSum { name, .. }
            | SpreadDefinition::CleanSpark { name, .. }
            | SpreadDefinition::Capacity { name, .. }
            | SpreadDefinition::Calendar { name, .. }
            | SpreadDefinition::BasePeak { name, .. } => name,
        }
    }

    /// Kind label used in tables and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SpreadDefinition::InterMarket { .. } => "inter_market",
            SpreadDefinition::WeightedSum { .. } => "weighted_sum",
            SpreadDefinition::CleanSpark { .. } => "clean_spark",
            SpreadDefinition::Capacity { .. } => "capacity",
            SpreadDefinition::Calendar { .. } => "calendar",
            SpreadDefinition::BasePeak { .. } => "base_peak",
        }
    }

    /// Markets whose curves are read, deduplicated, in first-use order.
    pub fn markets(&self) -> Vec<MarketCode> {
        let mut out: Vec<MarketCode> = Vec::new();
        let raw: Vec<MarketCode> = match self {
            SpreadDefinition::InterMarket { long, short, .. } => vec![*long, *short],
            SpreadDefinition::WeightedSum { legs, .. } => legs.iter().map(|l| l.market).collect(),
            SpreadDefinition::Capacity { from, to, .. } => vec![*from, *to],
            SpreadDefinition::CleanSpark { market, .. }
            | SpreadDefinition::Calendar { market, .. }
            | SpreadDefinition::BasePeak { market, .. } => vec![*market],
        };
        for m in raw {
            if !out.contains(&m) {
                out.push(m);
            }
        }
        out
    }

    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<(), SpreadConfigError> {
        let invalid = |message: String| {
            Err(SpreadConfigError::InvalidDefinition {
                name: self.name().to_string(),
                message,
            })
        };
        if self.name().trim().is_empty() {
            return invalid("name is empty".to_string());
        }
        match self {
            SpreadDefinition::InterMarket { long, short, .. } if long == short => {
                invalid(format!("long and short are both {}", long))
            }
            SpreadDefinition::Capacity { from, to, .. } if from == to => {
                invalid(format!("from and to are both {}", from))
            }
            SpreadDefinition::Capacity { capacity_mw, .. } if !capacity_mw.is_finite() || *capacity_mw < 0.0 => {
                invalid(format!("capacity_mw must be finite and >= 0, got {}", capacity_mw))
            }
            SpreadDefinition::WeightedSum { legs, .. } if legs.is_empty() => invalid("no legs".to_string()),
            SpreadDefinition::WeightedSum { legs, constant, .. }
                if !constant.is_finite() || legs.iter().any(|l| !l.weight.is_finite()) =>
            {
                invalid("weights and constant must be finite".to_string())
            }
            SpreadDefinition::WeightedSum { legs, .. } if legs.iter().any(|l| l.driver == Some(DataType::Price)) => {
                invalid("use a price leg (no driver) to read price".to_string())
            }
            SpreadDefinition::CleanSpark { efficiency, .. } if !(*efficiency > 0.0 && *efficiency <= 1.0) => {
                invalid(format!("efficiency must be in (0, 1], got {}", efficiency))
            }
            SpreadDefinition::CleanSpark { carbon_intensity, .. }
                if !carbon_intensity.is_finite() || *carbon_intensity < 0.0 =>
            {
                invalid(format!("carbon_intensity must be finite and >= 0, got {}", carbon_intensity))
            }
            SpreadDefinition::Calendar { offset: 0, .. } => invalid("offset must be >= 1".to_string()),
            _ => Ok(()),
        }
    }
}

/// Validates every definition and checks names are unique.
pub fn validate_all(definitions: &[SpreadDefinition]) -> Vec<String> {
    let mut errors: Vec<String> = definitions
        .iter()
        .filter_map(|d| d.validate().err().map(|e| e.to_string()))
        .collect();
    let mut names: Vec<&str> = definitions.iter().map(SpreadDefinition::name).collect();
    names.sort_unstable();
    for pair in names.windows(2) {
        if pair[0] == pair[1] {
            errors.push(format!("duplicate spread name '{}'", pair[0]));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            spreads: Vec<SpreadDefinition>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[spreads]]
            kind = "inter_market"
            name = "de-fr"
            long = "DE"
            short = "FR"

            [[spreads]]
            kind = "weighted_sum"
            name = "basket"
            legs = [{ market = "DE", weight = 0.5 }, { market = "DE", driver = "gas", weight = -2 }]

            [[spreads]]
            kind = "calendar"
            name = "de-week"
            market = "DE"
            period = "week"
            "#,
        )
        .unwrap();
        assert_eq!(doc.spreads.len(), 3);
        assert!(matches!(
            doc.spreads[0],
            SpreadDefinition::InterMarket { op: SpreadOp::Difference, .. }
        ));
        match &doc.spreads[1] {
            SpreadDefinition::WeightedSum { legs, constant, .. } => {
                assert_eq!(legs[1], SpreadLeg::driver(MarketCode::De, DataType::Gas, -2.0));
                assert_eq!(*constant, 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(doc.spreads[2], SpreadDefinition::Calendar { offset: 1, .. }));
        assert!(validate_all(&doc.spreads).is_empty());
    }

    #[test]
    fn test_validation() {
        let same = SpreadDefinition::InterMarket {
            name: "x".into(),
            long: MarketCode::De,
            short: MarketCode::De,
            op: SpreadOp::Difference,
        };
        assert!(same.validate().is_err());
        let bad_eff = SpreadDefinition::CleanSpark {
            name: "css".into(),
            market: MarketCode::Nl,
            efficiency: 1.5,
            carbon_intensity: 0.4,
        };
        assert!(bad_eff.validate().is_err());
        let zero_offset = SpreadDefinition::Calendar {
            name: "cal".into(),
            market: MarketCode::Fr,
            period: Period::Month,
            offset: 0,
            hours: Hours::Base,
        };
        assert!(zero_offset.validate().is_err());
    }

    #[test]
    fn test_duplicate_names_reported() {
        let d = SpreadDefinition::BasePeak {
            name: "bp".into(),
            market: MarketCode::De,
        };
        assert_eq!(validate_all(&[d.clone(), d]).len(), 1);
    }

    #[test]
    fn test_markets_deduplicated() {
        let d = SpreadDefinition::WeightedSum {
            name: "w".into(),
            legs: vec![
                SpreadLeg::price(MarketCode::De, 1.0),
                SpreadLeg::driver(MarketCode::De, DataType::Gas, -1.0),
                SpreadLeg::price(MarketCode::Fr, -1.0),
            ],
            constant: 0.0,
        };
        assert_eq!(d.markets(), vec![MarketCode::De, MarketCode::Fr]);
    }
}

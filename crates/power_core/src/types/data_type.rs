//! Series categories supplied by the data access layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::MarketError;

/// Closed set of series categories.
///
/// `Price` is the regression target; every other category is a fundamental
/// driver that can be used as a model feature and stressed by scenarios.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Day-ahead power price
    Price,
    /// Electricity consumption (load)
    Consumption,
    /// Available thermal generation capacity
    Capacity,
    /// Wind generation
    Wind,
    /// Solar generation
    Solar,
    /// Natural gas price
    Gas,
    /// Carbon allowance price
    Carbon,
    /// Coal price
    Coal,
}

impl DataType {
    /// Every category in declaration order.
    pub const ALL: [DataType; 8] = [
        DataType::Price,
        DataType::Consumption,
        DataType::Capacity,
        DataType::Wind,
        DataType::Solar,
        DataType::Gas,
        DataType::Carbon,
        DataType::Coal,
    ];

    /// Drivers used as features when a run does not configure its own list.
    pub const DEFAULT_DRIVERS: [DataType; 6] = [
        DataType::Consumption,
        DataType::Capacity,
        DataType::Wind,
        DataType::Solar,
        DataType::Gas,
        DataType::Carbon,
    ];

    /// Lower-case name used in file names and feature columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Price => "price",
            DataType::Consumption => "consumption",
            DataType::Capacity => "capacity",
            DataType::Wind => "wind",
            DataType::Solar => "solar",
            DataType::Gas => "gas",
            DataType::Carbon => "carbon",
            DataType::Coal => "coal",
        }
    }

    /// Fuel and emission prices shared across markets.
    pub fn is_fuel(&self) -> bool {
        matches!(self, DataType::Gas | DataType::Carbon | DataType::Coal)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        DataType::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == lower)
            .ok_or_else(|| MarketError::UnknownDataType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for dt in DataType::ALL {
            assert_eq!(dt.as_str().parse::<DataType>().unwrap(), dt);
        }
        assert!("oil".parse::<DataType>().is_err());
    }

    #[test]
    fn test_fuel_flags() {
        assert!(DataType::Gas.is_fuel());
        assert!(DataType::Carbon.is_fuel());
        assert!(!DataType::Consumption.is_fuel());
        assert!(!DataType::DEFAULT_DRIVERS.contains(&DataType::Price));
    }
}

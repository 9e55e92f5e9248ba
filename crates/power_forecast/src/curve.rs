//! Forecast curves and curve sets.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use power_core::types::{DataSeries, DataType, MarketCode, SeriesError};
use power_scenarios::CombinationId;

use crate::error::ForecastFailure;

/// Predicted price series for one market under one combination.
#[derive(Clone, Debug, PartialEq)]
pub struct ForecastCurve {
    /// Market
    pub market: MarketCode,
    /// Combination id
    pub combination: CombinationId,
    /// Hourly index over the horizon
    pub timestamps: Arc<[NaiveDateTime]>,
    /// Predicted price per timestamp
    pub values: Vec<f64>,
    /// Scenario-adjusted driver values the prediction was made from
    pub drivers: BTreeMap<DataType, Vec<f64>>,
    /// Combination weight
    pub weight: f64,
}

impl ForecastCurve {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The price curve as a [`DataSeries`].
    pub fn as_series(&self) -> Result<DataSeries, SeriesError> {
        DataSeries::from_parts(
            self.market,
            DataType::Price,
            self.timestamps.to_vec(),
            self.values.clone(),
        )
    }

    /// Driver values for `data_type`, if the model used it.
    pub fn driver(&self, data_type: DataType) -> Option<&[f64]> {
        self.drivers.get(&data_type).map(Vec::as_slice)
    }
}

/// Successful curves keyed by combination then market, plus failures.
///
/// Within a market every curve shares one timestamp index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForecastCurveSet {
    curves: BTreeMap<CombinationId, BTreeMap<MarketCode, ForecastCurve>>,
    failures: Vec<ForecastFailure>,
}

impl ForecastCurveSet {
    pub(crate) fn from_parts(
        curves: BTreeMap<CombinationId, BTreeMap<MarketCode, ForecastCurve>>,
        failures: Vec<ForecastFailure>,
    ) -> Self {
        Self { curves, failures }
    }

    /// Curve for (`combination`, `market`).
    pub fn get(&self, combination: &CombinationId, market: MarketCode) -> Option<&ForecastCurve> {
        self.curves.get(combination)?.get(&market)
    }

    /// Curves of one combination by market.
    pub fn combination(&self, combination: &CombinationId) -> Option<&BTreeMap<MarketCode, ForecastCurve>> {
        self.curves.get(combination)
    }

    /// Combination ids with at least one curve, ascending.
    pub fn combination_ids(&self) -> impl Iterator<Item = &CombinationId> {
        self.curves.keys()
    }

    /// Markets with at least one curve, ascending.
    pub fn markets(&self) -> Vec<MarketCode> {
        let mut markets: Vec<MarketCode> = self.curves.values().flat_map(|m| m.keys().copied()).collect();
        markets.sort();
        markets.dedup();
        markets
    }

    /// Every curve, ordered by combination then market.
    pub fn iter(&self) -> impl Iterator<Item = &ForecastCurve> {
        self.curves.values().flat_map(|m| m.values())
    }

    /// Number of curves.
    pub fn len(&self) -> usize {
        self.curves.values().map(BTreeMap::len).sum()
    }

    /// Returns true if no curve succeeded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-artifact failures.
    pub fn failures(&self) -> &[ForecastFailure] {
        &self.failures
    }

    /// Appends further failures.
    pub fn extend_failures(&mut self, failures: impl IntoIterator<Item = ForecastFailure>) {
        self.failures.extend(failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn curve(market: MarketCode, combination: &str, values: Vec<f64>) -> ForecastCurve {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let timestamps: Vec<_> = (0..values.len() as i64).map(|h| start + Duration::hours(h)).collect();
        ForecastCurve {
            market,
            combination: combination.parse().unwrap(),
            timestamps: timestamps.into(),
            values,
            drivers: BTreeMap::new(),
            weight: 1.0,
        }
    }

    #[test]
    fn test_as_series() {
        let c = curve(MarketCode::Nl, "base", vec![1.0, 2.0]);
        let s = c.as_series().unwrap();
        assert_eq!(s.market(), MarketCode::Nl);
        assert_eq!(s.data_type(), DataType::Price);
        assert_eq!(s.values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_set_lookup() {
        let a = curve(MarketCode::De, "base", vec![1.0]);
        let b = curve(MarketCode::Fr, "base", vec![2.0]);
        let mut by_market = BTreeMap::new();
        by_market.insert(a.market, a.clone());
        by_market.insert(b.market, b);
        let set = ForecastCurveSet::from_parts(BTreeMap::from([(CombinationId::base(), by_market)]), vec![]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.markets(), vec![MarketCode::De, MarketCode::Fr]);
        assert_eq!(set.get(&CombinationId::base(), MarketCode::De), Some(&a));
        assert!(set.get(&CombinationId::base(), MarketCode::Be).is_none());
    }
}

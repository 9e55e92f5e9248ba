//! The spread calculator.
//!
//! For each definition and each combination present in a curve set, looks up
//! the required curves and applies the definition's arithmetic. A combination
//! missing an input is skipped with a [`MissingInputError`]; the rest of the
//! run is unaffected. Definitions are evaluated in parallel and results are
//! returned in definition order, then combination id order.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use power_core::types::{DataType, MarketCatalog, MarketCode, MarketConfig};
use power_forecast::curve::{ForecastCurve, ForecastCurveSet};
use power_scenarios::CombinationId;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::definition::{SpreadDefinition, SpreadOp};
use crate::error::{MissingInput, MissingInputError};
use crate::period::{base_peak, calendar_spread};

/// A derived series for one spread under one combination.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpreadResult {
    /// Spread name
    pub name: String,
    /// Spread kind label
    pub kind: &'static str,
    /// Combination id
    pub combination: CombinationId,
    /// Unit of the values
    pub unit: String,
    /// Timestamps (hourly, or period starts for resampled kinds)
    pub timestamps: Vec<NaiveDateTime>,
    /// Spread values
    pub values: Vec<f64>,
}

impl SpreadResult {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a calculation produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpreadOutput {
    /// Computed spreads
    pub results: Vec<SpreadResult>,
    /// Skipped (spread, combination) pairs
    pub missing: Vec<MissingInputError>,
}

/// Computes spreads using market conventions from a catalog.
#[derive(Clone, Debug)]
pub struct SpreadCalculator {
    catalog: MarketCatalog,
}

impl Default for SpreadCalculator {
    fn default() -> Self {
        Self::new(MarketCatalog::default_europe())
    }
}

struct Values {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
    unit: String,
}

impl SpreadCalculator {
    /// Calculator over `catalog`.
    pub fn new(catalog: MarketCatalog) -> Self {
        Self { catalog }
    }

    fn config(&self, market: MarketCode) -> MarketConfig {
        self.catalog
            .get(market)
            .cloned()
            .unwrap_or_else(|_| MarketConfig::new(market))
    }

    /// Evaluates every definition against every combination in `curves`.
    pub fn compute(&self, curves: &ForecastCurveSet, definitions: &[SpreadDefinition]) -> SpreadOutput {
        let ids: Vec<&CombinationId> = curves.combination_ids().collect();
        let per_definition: Vec<SpreadOutput> = definitions
            .par_iter()
            .map(|def| {
                let mut out = SpreadOutput::default();
                for id in &ids {
                    let empty = BTreeMap::new();
                    let by_market = curves.combination(id).unwrap_or(&empty);
                    match self.evaluate(def, by_market) {
                        Ok(v) => out.results.push(SpreadResult {
                            name: def.name().to_string(),
                            kind: def.kind(),
                            combination: (*id).clone(),
                            unit: v.unit,
                            timestamps: v.timestamps,
                            values: v.values,
                        }),
                        Err(input) => {
                            warn!(spread = def.name(), combination = %id, missing = %input, "Spread skipped");
                            out.missing.push(MissingInputError {
                                spread: def.name().to_string(),
                                combination: (*id).clone(),
                                input,
                            });
                        }
                    }
                }
                out
            })
            .collect();

        let mut output = SpreadOutput::default();
        for part in per_definition {
            output.results.extend(part.results);
            output.missing.extend(part.missing);
        }
        info!(
            definitions = definitions.len(),
            combinations = ids.len(),
            results = output.results.len(),
            missing = output.missing.len(),
            "Spread calculation finished"
        );
        output
    }

    fn evaluate(
        &self,
        def: &SpreadDefinition,
        curves: &BTreeMap<MarketCode, ForecastCurve>,
    ) -> Result<Values, MissingInput> {
        let curve = move |market: MarketCode| curves.get(&market).ok_or(MissingInput::Curve { market });

        match def {
            SpreadDefinition::InterMarket { long, short, op, .. } => {
                let a = curve(*long)?;
                let b = curve(*short)?;
                aligned(a, b)?;
                let values = match op {
                    SpreadOp::Difference => a.values.iter().zip(&b.values).map(|(x, y)| x - y).collect(),
                    SpreadOp::Ratio => {
                        if let Some(pos) = b.values.iter().position(|y| *y == 0.0) {
                            return Err(MissingInput::ZeroDenominator {
                                timestamp: b.timestamps[pos],
                            });
                        }
                        a.values.iter().zip(&b.values).map(|(x, y)| x / y).collect()
                    }
                };
                let unit = match op {
                    SpreadOp::Difference => self.config(*long).unit(),
                    SpreadOp::Ratio => "ratio".to_string(),
                };
                Ok(Values {
                    timestamps: a.timestamps.to_vec(),
                    values,
                    unit,
                })
            }
            SpreadDefinition::WeightedSum { legs, constant, .. } => {
                let Some(first_leg) = legs.first() else {
                    return Ok(Values {
                        timestamps: Vec::new(),
                        values: Vec::new(),
                        unit: String::new(),
                    });
                };
                let first = curve(first_leg.market)?;
                let mut values = vec![*constant; first.len()];
                for leg in legs {
                    let c = curve(leg.market)?;
                    aligned(first, c)?;
                    let series = match leg.driver {
                        Some(dt) => driver(c, dt)?,
                        None => c.values.as_slice(),
                    };
                    for (out, v) in values.iter_mut().zip(series) {
                        *out += leg.weight * v;
                    }
                }
                Ok(Values {
                    timestamps: first.timestamps.to_vec(),
                    values,
                    unit: self.config(first.market).unit(),
                })
            }
            SpreadDefinition::CleanSpark {
                market,
                efficiency,
                carbon_intensity,
                ..
            } => {
                let c = curve(*market)?;
                let gas = driver(c, DataType::Gas)?;
                let carbon = driver(c, DataType::Carbon)?;
                let values = c
                    .values
                    .iter()
                    .zip(gas)
                    .zip(carbon)
                    .map(|((p, g), co2)| p - g / efficiency - co2 * carbon_intensity)
                    .collect();
                Ok(Values {
                    timestamps: c.timestamps.to_vec(),
                    values,
                    unit: self.config(*market).unit(),
                })
            }
            SpreadDefinition::Capacity {
                from, to, capacity_mw, ..
            } => {
                let a = curve(*from)?;
                let b = curve(*to)?;
                aligned(a, b)?;
                let values = a
                    .values
                    .iter()
                    .zip(&b.values)
                    .map(|(pf, pt)| (pt - pf).max(0.0) * capacity_mw)
                    .collect();
                Ok(Values {
                    timestamps: a.timestamps.to_vec(),
                    values,
                    unit: format!("{}/h", self.config(*to).currency),
                })
            }
            SpreadDefinition::Calendar {
                market,
                period,
                offset,
                hours,
                ..
            } => {
                let c = curve(*market)?;
                let config = self.config(*market);
                let (timestamps, values) =
                    calendar_spread(*period, *offset, *hours, &config.calendar, &c.timestamps, &c.values)?;
                Ok(Values {
                    timestamps,
                    values,
                    unit: config.unit(),
                })
            }
            SpreadDefinition::BasePeak { market, .. } => {
                let c = curve(*market)?;
                let config = self.config(*market);
                let (timestamps, values) = base_peak(&config.calendar, &c.timestamps, &c.values);
                Ok(Values {
                    timestamps,
                    values,
                    unit: config.unit(),
                })
            }
        }
    }
}

fn aligned(first: &ForecastCurve, other: &ForecastCurve) -> Result<(), MissingInput> {
    if first.timestamps[..] == other.timestamps[..] {
        Ok(())
    } else {
        Err(MissingInput::MisalignedLegs { market: other.market })
    }
}

fn driver(curve: &ForecastCurve, data_type: DataType) -> Result<&[f64], MissingInput> {
    curve
        .driver(data_type)
        .filter(|v| v.len() == curve.len())
        .ok_or(MissingInput::Driver {
            market: curve.market,
            data_type,
        })
}

/// Computes spreads with the default European market catalog.
pub fn compute(curves: &ForecastCurveSet, definitions: &[SpreadDefinition]) -> SpreadOutput {
    SpreadCalculator::default().compute(curves, definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Hours, Period, SpreadLeg};
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use power_forecast::aggregator::aggregate;

    fn curve(market: MarketCode, id: &str, values: Vec<f64>) -> ForecastCurve {
        let start = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let ts: Vec<_> = (0..values.len() as i64).map(|h| start + Duration::hours(h)).collect();
        let n = values.len();
        ForecastCurve {
            market,
            combination: id.parse().unwrap(),
            timestamps: ts.into(),
            values,
            drivers: BTreeMap::from([(DataType::Gas, vec![30.0; n]), (DataType::Carbon, vec![80.0; n])]),
            weight: 1.0,
        }
    }

    #[test]
    fn test_ratio_and_zero_denominator() {
        let set = aggregate(
            vec![
                curve(MarketCode::De, "base", vec![10.0, 12.0]),
                curve(MarketCode::Fr, "base", vec![5.0, 0.0]),
            ],
            vec![],
        );
        let def = SpreadDefinition::InterMarket {
            name: "r".into(),
            long: MarketCode::De,
            short: MarketCode::Fr,
            op: SpreadOp::Ratio,
        };
        let out = compute(&set, &[def]);
        assert!(out.results.is_empty());
        assert!(matches!(out.missing[0].input, MissingInput::ZeroDenominator { .. }));
    }

    #[test]
    fn test_clean_spark() {
        let set = aggregate(vec![curve(MarketCode::De, "base", vec![120.0, 100.0])], vec![]);
        let def = SpreadDefinition::CleanSpark {
            name: "css".into(),
            market: MarketCode::De,
            efficiency: 0.5,
            carbon_intensity: 0.25,
        };
        let out = compute(&set, &[def]);
        // 120 - 30 / 0.5 - 80 * 0.25 = 40
        assert_relative_eq!(out.results[0].values[0], 40.0);
        assert_relative_eq!(out.results[0].values[1], 20.0);
        assert_eq!(out.results[0].unit, "EUR/MWh");
    }

    #[test]
    fn test_capacity_value_floors_at_zero() {
        let set = aggregate(
            vec![
                curve(MarketCode::Fr, "base", vec![50.0, 70.0]),
                curve(MarketCode::De, "base", vec![60.0, 65.0]),
            ],
            vec![],
        );
        let def = SpreadDefinition::Capacity {
            name: "fr-de".into(),
            from: MarketCode::Fr,
            to: MarketCode::De,
            capacity_mw: 100.0,
        };
        let out = compute(&set, &[def]);
        assert_eq!(out.results[0].values, vec![1000.0, 0.0]);
        assert_eq!(out.results[0].unit, "EUR/h");
    }

    #[test]
    fn test_weighted_sum_with_driver_leg() {
        let set = aggregate(vec![curve(MarketCode::Nl, "base", vec![90.0])], vec![]);
        let def = SpreadDefinition::WeightedSum {
            name: "w".into(),
            legs: vec![
                SpreadLeg::price(MarketCode::Nl, 1.0),
                SpreadLeg::driver(MarketCode::Nl, DataType::Gas, -2.0),
            ],
            constant: 5.0,
        };
        let out = compute(&set, &[def]);
        assert_relative_eq!(out.results[0].values[0], 35.0);
    }

    #[test]
    fn test_missing_driver() {
        let mut c = curve(MarketCode::Be, "base", vec![1.0]);
        c.drivers.clear();
        let set = aggregate(vec![c], vec![]);
        let def = SpreadDefinition::CleanSpark {
            name: "css".into(),
            market: MarketCode::Be,
            efficiency: 0.5,
            carbon_intensity: 0.3,
        };
        let out = compute(&set, &[def]);
        assert_eq!(
            out.missing[0].input,
            MissingInput::Driver {
                market: MarketCode::Be,
                data_type: DataType::Gas
            }
        );
    }

    #[test]
    fn test_calendar_and_base_peak_use_curve() {
        // 2025-05-05 is a Monday; three days of flat-by-day prices
        let values: Vec<f64> = (0..72).map(|h| 50.0 + (h / 24) as f64).collect();
        let set = aggregate(vec![curve(MarketCode::De, "base", values)], vec![]);
        let defs = vec![
            SpreadDefinition::Calendar {
                name: "dah".into(),
                market: MarketCode::De,
                period: Period::Day,
                offset: 1,
                hours: Hours::Base,
            },
            SpreadDefinition::BasePeak {
                name: "bp".into(),
                market: MarketCode::De,
            },
        ];
        let out = compute(&set, &defs);
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].name, "dah");
        assert_eq!(out.results[0].values, vec![1.0, 1.0]);
        assert_eq!(out.results[1].values.len(), 3);
        assert_relative_eq!(out.results[1].values[0], 0.0);
    }
}

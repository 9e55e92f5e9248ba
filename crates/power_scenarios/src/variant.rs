//! Scenario variants and axes.
//!
//! A [`ScenarioAxis`] is a named dimension of variation holding an ordered set
//! of [`ScenarioVariant`]s. Each variant carries the parameters it was
//! generated from (provenance), an [`Adjustment`] for the axis target data
//! type, a severity used by plausibility rules and an optional probability.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use power_core::types::{DataType, MarketCode};
use serde::{Deserialize, Serialize};

use crate::adjustment::{Adjustment, FuelShock, Outage};
use crate::error::ScenarioError;

/// Characters allowed in axis names and variant ids.
///
/// `=` and `;` are reserved for combination ids.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+')))
    {
        return Err(format!("character '{}' not allowed in '{}'", c, name));
    }
    Ok(())
}

/// Parameters a variant was generated from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "generator", rename_all = "snake_case")]
pub enum VariantParams {
    /// Hand-written variant.
    Manual,
    /// Historical percentile shift.
    Percentile {
        /// Percentile level (1..=99)
        level: u8,
        /// Lookback window in days
        lookback_days: u32,
    },
    /// Capacity outage level.
    Outage {
        /// Outages stacked in the variant
        outages: Vec<Outage>,
    },
    /// Fuel or carbon stress test.
    FuelStress {
        /// Shock definition
        shock: FuelShock,
    },
}

/// One concrete value along a scenario axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioVariant {
    id: String,
    params: VariantParams,
    adjustment: Adjustment,
    severity: f64,
    weight: Option<f64>,
}

impl ScenarioVariant {
    /// Creates a variant with zero severity and no explicit weight.
    pub fn new(id: impl Into<String>, params: VariantParams, adjustment: Adjustment) -> Self {
        Self {
            id: id.into(),
            params,
            adjustment,
            severity: 0.0,
            weight: None,
        }
    }

    /// Variant that leaves the target series unchanged.
    pub fn identity(id: impl Into<String>) -> Self {
        Self::new(id, VariantParams::Manual, Adjustment::Identity)
    }

    /// Sets the severity (builder style).
    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }

    /// Sets an explicit probability (builder style).
    pub fn with_weight(mut self, weight: Option<f64>) -> Self {
        self.weight = weight;
        self
    }

    /// Variant id, unique within its axis.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Generating parameters.
    pub fn params(&self) -> &VariantParams {
        &self.params
    }

    /// Adjustment applied to the axis target series.
    pub fn adjustment(&self) -> &Adjustment {
        &self.adjustment
    }

    /// Severity used by plausibility bounds.
    pub fn severity(&self) -> f64 {
        self.severity
    }

    /// Explicit probability, if any.
    pub fn weight(&self) -> Option<f64> {
        self.weight
    }
}

/// Generator family that produced an axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    /// Historical percentile shifts
    Percentile,
    /// Capacity/outage de-rates
    Outage,
    /// Fuel and carbon price stress
    FuelStress,
}

impl fmt::Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AxisKind::Percentile => "percentile",
            AxisKind::Outage => "outage",
            AxisKind::FuelStress => "fuel_stress",
        };
        write!(f, "{}", s)
    }
}

/// A named dimension of variation.
///
/// Variants are kept sorted by id so that enumeration order does not depend
/// on generation order.
#[derive(Clone, Debug)]
pub struct ScenarioAxis {
    name: String,
    kind: AxisKind,
    target: DataType,
    variants: Vec<Arc<ScenarioVariant>>,
}

impl ScenarioAxis {
    /// Builds an axis, validating the name and variant ids.
    ///
    /// Fails on an invalid name, an empty variant list, an invalid or
    /// duplicate variant id, a negative or non-finite weight or severity.
    pub fn new(
        name: impl Into<String>,
        kind: AxisKind,
        target: DataType,
        variants: Vec<ScenarioVariant>,
    ) -> Result<Self, ScenarioError> {
        let name = name.into();
        let invalid = |message: String| ScenarioError::InvalidAxis {
            axis: name.clone(),
            message,
        };

        validate_name(&name).map_err(&invalid)?;
        if variants.is_empty() {
            return Err(invalid("axis has no variants".to_string()));
        }
        let mut seen = BTreeSet::new();
        for v in &variants {
            validate_name(&v.id).map_err(&invalid)?;
            if !seen.insert(v.id.as_str()) {
                return Err(invalid(format!("duplicate variant id '{}'", v.id)));
            }
            if !v.severity.is_finite() {
                return Err(invalid(format!("variant '{}' has non-finite severity", v.id)));
            }
            if let Some(w) = v.weight {
                if !w.is_finite() || w < 0.0 {
                    return Err(invalid(format!("variant '{}' has invalid weight {}", v.id, w)));
                }
            }
        }

        let mut variants: Vec<Arc<ScenarioVariant>> = variants.into_iter().map(Arc::new).collect();
        variants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self {
            name,
            kind,
            target,
            variants,
        })
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generator family.
    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    /// Data type the variants adjust.
    pub fn target(&self) -> DataType {
        self.target
    }

    /// Variants sorted by id.
    pub fn variants(&self) -> &[Arc<ScenarioVariant>] {
        &self.variants
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Always false for a constructed axis.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Position of the variant with `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.variants
            .binary_search_by(|v| v.id.as_str().cmp(id))
            .ok()
    }

    /// Whether every variant carries an adjustment for `market`.
    pub fn covers(&self, market: MarketCode) -> bool {
        self.variants.iter().all(|v| v.adjustment.covers(market))
    }

    /// Returns true if every variant has an explicit weight.
    pub fn fully_weighted(&self) -> bool {
        self.variants.iter().all(|v| v.weight.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(ids: &[&str]) -> Result<ScenarioAxis, ScenarioError> {
        ScenarioAxis::new(
            "capacity-outage",
            AxisKind::Outage,
            DataType::Capacity,
            ids.iter().map(|id| ScenarioVariant::identity(*id)).collect(),
        )
    }

    #[test]
    fn test_variants_sorted_by_id() {
        let axis = axis(&["partial", "full", "none"]).unwrap();
        let ids: Vec<_> = axis.variants().iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec!["full", "none", "partial"]);
        assert_eq!(axis.position("none"), Some(1));
        assert_eq!(axis.position("missing"), None);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = axis(&["none", "none"]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_reserved_characters_rejected() {
        assert!(axis(&["a=b"]).is_err());
        assert!(axis(&["a;b"]).is_err());
        assert!(validate_name("gas-stress_1.5+").is_ok());
    }

    #[test]
    fn test_empty_axis_rejected() {
        assert!(axis(&[]).is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let result = ScenarioAxis::new(
            "w",
            AxisKind::FuelStress,
            DataType::Gas,
            vec![ScenarioVariant::identity("a").with_weight(Some(-0.1))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_axis_coverage() {
        let shift = |m: MarketCode| Adjustment::PerMarket {
            by_market: std::collections::BTreeMap::from([(m, Adjustment::Shift { offset: 2.0 })]),
        };
        let demand = ScenarioAxis::new(
            "demand",
            AxisKind::Percentile,
            DataType::Consumption,
            vec![
                ScenarioVariant::new("p10", VariantParams::Manual, shift(MarketCode::De)),
                ScenarioVariant::new("p90", VariantParams::Manual, shift(MarketCode::De)),
            ],
        )
        .unwrap();
        assert!(demand.covers(MarketCode::De));
        assert!(!demand.covers(MarketCode::Fr));
        assert!(axis(&["none", "full"]).unwrap().covers(MarketCode::Fr));
    }
}

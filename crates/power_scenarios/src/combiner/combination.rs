//! Scenario combinations.

use std::sync::Arc;

use power_core::types::{DataSeries, DataType, MarketCode};
use serde::Serialize;

use super::id::CombinationId;
use crate::variant::ScenarioVariant;

/// The variant chosen on one axis.
#[derive(Clone, Debug)]
pub struct Selection {
    /// Axis name
    pub axis: String,
    /// Data type the axis adjusts
    pub target: DataType,
    /// Chosen variant
    pub variant: Arc<ScenarioVariant>,
}

/// One variant per active axis plus a derived id and weight.
#[derive(Clone, Debug)]
pub struct ScenarioCombination {
    id: CombinationId,
    selections: Vec<Selection>,
    weight: f64,
}

impl ScenarioCombination {
    pub(crate) fn new(selections: Vec<Selection>, weight: f64) -> Self {
        let id = CombinationId::encode(
            selections
                .iter()
                .map(|s| (s.axis.as_str(), s.variant.id())),
        );
        Self {
            id,
            selections,
            weight,
        }
    }

    /// The combination with no axes.
    pub fn base() -> Self {
        Self::new(Vec::new(), 1.0)
    }

    /// Canonical id.
    pub fn id(&self) -> &CombinationId {
        &self.id
    }

    /// Selections in axis order.
    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// Normalised probability weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Sum of the selected variants' severities.
    pub fn total_severity(&self) -> f64 {
        self.selections.iter().map(|s| s.variant.severity()).sum()
    }

    /// Data types touched by at least one selection.
    pub fn adjusted_types(&self) -> Vec<DataType> {
        let mut types: Vec<DataType> = self.selections.iter().map(|s| s.target).collect();
        types.sort();
        types.dedup();
        types
    }

    /// Applies every selection targeting the series' data type, in axis order.
    pub fn apply(&self, market: MarketCode, series: &DataSeries) -> DataSeries {
        self.selections
            .iter()
            .filter(|s| s.target == series.data_type())
            .fold(series.clone(), |acc, s| s.variant.adjustment().apply(market, &acc))
    }

    /// Serialisable description for run artifacts.
    pub fn describe(&self) -> CombinationInfo {
        CombinationInfo {
            id: self.id.to_string(),
            digest: self.id.digest(),
            weight: self.weight,
            severity: self.total_severity(),
            selections: self
                .selections
                .iter()
                .map(|s| (s.axis.clone(), s.variant.id().to_string()))
                .collect(),
        }
    }
}

/// Flat description of a combination.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CombinationInfo {
    /// Canonical id
    pub id: String,
    /// Short digest of the id
    pub digest: String,
    /// Normalised weight
    pub weight: f64,
    /// Total severity
    pub severity: f64,
    /// `(axis, variant)` in axis order
    pub selections: Vec<(String, String)>,
}

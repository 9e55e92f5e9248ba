//! Preset axes for common stress studies.
//!
//! Provides ready-to-use axis specifications:
//! - Demand percentiles (p10 / p50 / p90)
//! - Capacity outages (none / partial / full)
//! - Gas and carbon price shocks (down 20% / flat / up 20% / up 50%)

use power_core::types::DataType;

use crate::adjustment::{Derate, ShockSize};
use crate::combiner::{LimitPolicy, PruneRule};
use crate::config::{AxisSpec, ScenarioConfig};
use crate::generators::{FuelShockSpec, OutageLevel};

/// Types of preset axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresetAxis {
    /// Consumption p10 / p50 / p90 over one year of history
    DemandPercentiles,
    /// Capacity none / partial (80% available) / full outage
    CapacityOutages,
    /// Gas price shocks
    GasStress,
    /// Carbon price shocks
    CarbonStress,
}

impl PresetAxis {
    /// All presets in canonical order.
    pub fn all() -> Vec<Self> {
        vec![
            Self::DemandPercentiles,
            Self::CapacityOutages,
            Self::GasStress,
            Self::CarbonStress,
        ]
    }

    /// Axis name used in combination ids.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DemandPercentiles => "demand",
            Self::CapacityOutages => "outage",
            Self::GasStress => "gas-stress",
            Self::CarbonStress => "carbon-stress",
        }
    }

    /// Axis specification.
    pub fn spec(&self) -> AxisSpec {
        match self {
            Self::DemandPercentiles => AxisSpec::Percentile {
                name: self.name().to_string(),
                target: DataType::Consumption,
                levels: vec![10, 50, 90],
                lookback_days: 365,
                trend_window_hours: None,
                min_observations: None,
            },
            Self::CapacityOutages => AxisSpec::Outage {
                name: self.name().to_string(),
                target: DataType::Capacity,
                levels: vec![
                    OutageLevel::none("none"),
                    OutageLevel::single(
                        "partial",
                        Derate::Multiplicative { remaining: 0.8 },
                        0.5,
                    ),
                    OutageLevel::single("full", Derate::Multiplicative { remaining: 0.0 }, 1.0),
                ],
            },
            Self::GasStress => AxisSpec::FuelStress {
                name: self.name().to_string(),
                target: DataType::Gas,
                shocks: fuel_shocks(),
            },
            Self::CarbonStress => AxisSpec::FuelStress {
                name: self.name().to_string(),
                target: DataType::Carbon,
                shocks: fuel_shocks(),
            },
        }
    }
}

fn fuel_shocks() -> Vec<FuelShockSpec> {
    let mut flat = FuelShockSpec::percent("flat", 0.0);
    flat.size = ShockSize::Absolute(0.0);
    vec![
        FuelShockSpec::percent("down20", -20.0),
        flat,
        FuelShockSpec::percent("up20", 20.0),
        FuelShockSpec::percent("up50", 50.0),
    ]
}

/// Demand percentiles crossed with capacity outages and gas shocks.
///
/// High demand together with a full outage is bounded out.
pub fn standard_stress() -> ScenarioConfig {
    ScenarioConfig {
        axes: vec![
            PresetAxis::DemandPercentiles.spec(),
            PresetAxis::CapacityOutages.spec(),
            PresetAxis::GasStress.spec(),
        ],
        rules: vec![PruneRule::PlausibilityBound {
            axes: vec![
                PresetAxis::DemandPercentiles.name().to_string(),
                PresetAxis::CapacityOutages.name().to_string(),
            ],
            max_severity: 1.8,
        }],
        max_combinations: 1000,
        limit_policy: LimitPolicy::Sample,
        sample_seed: 42,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in PresetAxis::all() {
            assert!(preset.spec().validate().is_ok(), "{:?}", preset);
        }
        assert!(standard_stress().validate().is_empty());
    }

    #[test]
    fn test_preset_names_unique() {
        let mut names: Vec<_> = PresetAxis::all().iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 4);
    }
}

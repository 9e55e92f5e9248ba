//! Fuel-price stress generator.
//!
//! Turns configured shocks into variants over a fuel or carbon price series.

use serde::{Deserialize, Serialize};

use crate::adjustment::{Adjustment, FuelShock, ShockProfile, ShockSize};
use crate::error::ScenarioError;
use crate::variant::{ScenarioVariant, VariantParams};

/// One stress test on a fuel axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelShockSpec {
    /// Variant id
    pub id: String,
    /// Shock size
    pub size: ShockSize,
    /// Time profile (defaults to a level shift)
    #[serde(default = "level_profile")]
    pub profile: ShockProfile,
    /// Severity for plausibility bounds
    #[serde(default)]
    pub severity: f64,
    /// Optional probability
    #[serde(default)]
    pub weight: Option<f64>,
}

fn level_profile() -> ShockProfile {
    ShockProfile::Level
}

impl FuelShockSpec {
    /// Level shift by `pct` percent.
    pub fn percent(id: impl Into<String>, pct: f64) -> Self {
        Self {
            id: id.into(),
            size: ShockSize::Percent(pct),
            profile: ShockProfile::Level,
            severity: (pct / 100.0).abs(),
            weight: None,
        }
    }
}

/// Builds fuel stress variants.
pub fn generate(axis: &str, shocks: &[FuelShockSpec]) -> Result<Vec<ScenarioVariant>, ScenarioError> {
    shocks
        .iter()
        .map(|spec| {
            match spec.size {
                ShockSize::Percent(p) if !p.is_finite() || p <= -100.0 => {
                    return Err(ScenarioError::params(
                        axis,
                        format!("shock '{}': percent change {} must exceed -100", spec.id, p),
                    ))
                }
                ShockSize::Absolute(a) if !a.is_finite() => {
                    return Err(ScenarioError::params(
                        axis,
                        format!("shock '{}': absolute change is not finite", spec.id),
                    ))
                }
                _ => {}
            }
            if let ShockProfile::Ramp { start, end } = spec.profile {
                if end <= start {
                    return Err(ScenarioError::params(
                        axis,
                        format!("shock '{}': ramp end {} not after start {}", spec.id, end, start),
                    ));
                }
            }
            let shock = FuelShock {
                size: spec.size,
                profile: spec.profile,
            };
            Ok(ScenarioVariant::new(
                spec.id.clone(),
                VariantParams::FuelStress { shock },
                Adjustment::FuelShock(shock),
            )
            .with_severity(spec.severity)
            .with_weight(spec.weight))
        })
        .collect()
}

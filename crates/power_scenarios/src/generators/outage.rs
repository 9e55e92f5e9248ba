//! Capacity/outage scenario generator.
//!
//! Each configured level becomes one variant whose adjustment stacks the
//! level's outages over the capacity series.

use serde::{Deserialize, Serialize};

use crate::adjustment::{Adjustment, Derate, Outage};
use crate::error::ScenarioError;
use crate::variant::{ScenarioVariant, VariantParams};

/// One outage level on an outage axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutageLevel {
    /// Variant id
    pub id: String,
    /// Outages applied simultaneously (empty = no outage)
    #[serde(default)]
    pub outages: Vec<Outage>,
    /// Severity for plausibility bounds
    #[serde(default)]
    pub severity: f64,
    /// Optional probability
    #[serde(default)]
    pub weight: Option<f64>,
}

impl OutageLevel {
    /// Level with no outage.
    pub fn none(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outages: Vec::new(),
            severity: 0.0,
            weight: None,
        }
    }

    /// Level with a single whole-period outage.
    pub fn single(id: impl Into<String>, derate: Derate, severity: f64) -> Self {
        Self {
            id: id.into(),
            outages: vec![Outage::whole(derate)],
            severity,
            weight: None,
        }
    }
}

fn validate_outage(axis: &str, level: &str, outage: &Outage) -> Result<(), ScenarioError> {
    match outage.derate {
        Derate::Multiplicative { remaining } => {
            if !(0.0..=1.0).contains(&remaining) {
                return Err(ScenarioError::params(
                    axis,
                    format!("level '{}': remaining fraction {} outside [0, 1]", level, remaining),
                ));
            }
        }
        Derate::Additive { mw } => {
            if !mw.is_finite() || mw < 0.0 {
                return Err(ScenarioError::params(
                    axis,
                    format!("level '{}': additive de-rate {} must be non-negative", level, mw),
                ));
            }
        }
    }
    if let (Some(from), Some(until)) = (outage.from, outage.until) {
        if until <= from {
            return Err(ScenarioError::params(
                axis,
                format!("level '{}': outage period {}..{} is empty", level, from, until),
            ));
        }
    }
    Ok(())
}

/// Builds outage variants from configured levels.
pub fn generate(axis: &str, levels: &[OutageLevel]) -> Result<Vec<ScenarioVariant>, ScenarioError> {
    levels
        .iter()
        .map(|level| {
            for outage in &level.outages {
                validate_outage(axis, &level.id, outage)?;
            }
            Ok(ScenarioVariant::new(
                level.id.clone(),
                VariantParams::Outage {
                    outages: level.outages.clone(),
                },
                Adjustment::Derate {
                    outages: level.outages.clone(),
                },
            )
            .with_severity(level.severity)
            .with_weight(level.weight))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_none_and_full_levels() {
        let levels = vec![
            OutageLevel::none("none"),
            OutageLevel::single("full", Derate::Multiplicative { remaining: 0.0 }, 1.0),
        ];
        let variants = generate("capacity-outage", &levels).unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants[0].adjustment().is_identity());
        assert_eq!(variants[1].severity(), 1.0);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let levels = vec![OutageLevel::single(
            "bad",
            Derate::Multiplicative { remaining: 1.5 },
            0.0,
        )];
        assert!(generate("outage", &levels).is_err());
    }

    #[test]
    fn test_empty_period_rejected() {
        let t = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let level = OutageLevel {
            id: "planned".into(),
            outages: vec![Outage::between(t, t, Derate::Additive { mw: 100.0 })],
            severity: 0.3,
            weight: None,
        };
        assert!(generate("outage", &[level]).is_err());
    }
}

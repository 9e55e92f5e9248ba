//! Prune rules.
//!
//! Rules are data, not code: each kind is configured with explicit axes,
//! variants and thresholds. Rules are resolved against the active axes once
//! (unknown names are configuration errors) and then evaluated on variant
//! positions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CombinationError;
use crate::variant::ScenarioAxis;

/// A declared incompatibility or similarity collapse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PruneRule {
    /// Remove combinations selecting all of the given variants.
    Forbid {
        /// Axis name -> variant id
        selections: BTreeMap<String, String>,
    },
    /// Remove combinations whose summed severity over `axes` exceeds `max_severity`.
    ///
    /// An empty axis list means every axis.
    PlausibilityBound {
        /// Axes whose severities are summed
        #[serde(default)]
        axes: Vec<String>,
        /// Largest admissible sum
        max_severity: f64,
    },
    /// Collapse combinations whose severity profiles differ by less than
    /// `threshold` on every axis into the first such combination.
    Deduplicate {
        /// Per-axis severity distance below which two combinations are alike
        threshold: f64,
    },
}

/// A rule bound to axis positions.
#[derive(Clone, Debug)]
pub(crate) enum ResolvedRule {
    Forbid(Vec<(usize, usize)>),
    Bound { axes: Vec<usize>, max: f64 },
    Deduplicate { threshold: f64 },
}

fn axis_index(axes: &[ScenarioAxis], rule: usize, name: &str) -> Result<usize, CombinationError> {
    axes.iter()
        .position(|a| a.name() == name)
        .ok_or_else(|| CombinationError::UnknownAxis {
            rule,
            axis: name.to_string(),
        })
}

impl PruneRule {
    pub(crate) fn resolve(
        &self,
        rule: usize,
        axes: &[ScenarioAxis],
    ) -> Result<ResolvedRule, CombinationError> {
        match self {
            PruneRule::Forbid { selections } => {
                if selections.is_empty() {
                    return Err(CombinationError::InvalidRule {
                        rule,
                        message: "forbid rule selects nothing".to_string(),
                    });
                }
                let mut resolved = Vec::with_capacity(selections.len());
                for (axis_name, variant) in selections {
                    let ai = axis_index(axes, rule, axis_name)?;
                    let vi = axes[ai].position(variant).ok_or_else(|| {
                        CombinationError::UnknownVariant {
                            rule,
                            axis: axis_name.clone(),
                            variant: variant.clone(),
                        }
                    })?;
                    resolved.push((ai, vi));
                }
                Ok(ResolvedRule::Forbid(resolved))
            }
            PruneRule::PlausibilityBound {
                axes: names,
                max_severity,
            } => {
                if !max_severity.is_finite() {
                    return Err(CombinationError::InvalidRule {
                        rule,
                        message: "max_severity must be finite".to_string(),
                    });
                }
                let indices = if names.is_empty() {
                    (0..axes.len()).collect()
                } else {
                    names
                        .iter()
                        .map(|n| axis_index(axes, rule, n))
                        .collect::<Result<Vec<_>, _>>()?
                };
                Ok(ResolvedRule::Bound {
                    axes: indices,
                    max: *max_severity,
                })
            }
            PruneRule::Deduplicate { threshold } => {
                if !threshold.is_finite() || *threshold < 0.0 {
                    return Err(CombinationError::InvalidRule {
                        rule,
                        message: format!("threshold {} must be non-negative", threshold),
                    });
                }
                Ok(ResolvedRule::Deduplicate {
                    threshold: *threshold,
                })
            }
        }
    }
}

impl ResolvedRule {
    /// Whether a filter rule removes the selection. Deduplicate never filters.
    pub(crate) fn rejects(&self, axes: &[ScenarioAxis], selection: &[usize]) -> bool {
        match self {
            ResolvedRule::Forbid(pairs) => pairs.iter().all(|&(a, v)| selection[a] == v),
            ResolvedRule::Bound { axes: idx, max } => {
                let total: f64 = idx
                    .iter()
                    .map(|&a| axes[a].variants()[selection[a]].severity())
                    .sum();
                total > *max
            }
            ResolvedRule::Deduplicate { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{AxisKind, ScenarioVariant};
    use power_core::types::DataType;

    fn axes() -> Vec<ScenarioAxis> {
        vec![
            ScenarioAxis::new(
                "demand",
                AxisKind::Percentile,
                DataType::Consumption,
                vec![
                    ScenarioVariant::identity("p10").with_severity(0.1),
                    ScenarioVariant::identity("p90").with_severity(0.9),
                ],
            )
            .unwrap(),
            ScenarioAxis::new(
                "outage",
                AxisKind::Outage,
                DataType::Capacity,
                vec![
                    ScenarioVariant::identity("none"),
                    ScenarioVariant::identity("full").with_severity(1.0),
                ],
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_forbid_resolves_positions() {
        let axes = axes();
        let rule = PruneRule::Forbid {
            selections: [("demand".to_string(), "p90".to_string()), ("outage".to_string(), "full".to_string())]
                .into_iter()
                .collect(),
        };
        let resolved = rule.resolve(0, &axes).unwrap();
        // outage variants sort as [full, none]
        assert!(resolved.rejects(&axes, &[1, 0]));
        assert!(!resolved.rejects(&axes, &[1, 1]));
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let axes = axes();
        let bad_axis = PruneRule::PlausibilityBound {
            axes: vec!["wind".into()],
            max_severity: 1.0,
        };
        assert!(matches!(
            bad_axis.resolve(3, &axes),
            Err(CombinationError::UnknownAxis { rule: 3, .. })
        ));
        let bad_variant = PruneRule::Forbid {
            selections: [("demand".to_string(), "p50".to_string())].into_iter().collect(),
        };
        assert!(matches!(
            bad_variant.resolve(0, &axes),
            Err(CombinationError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_plausibility_bound() {
        let axes = axes();
        let rule = PruneRule::PlausibilityBound {
            axes: vec![],
            max_severity: 1.5,
        }
        .resolve(0, &axes)
        .unwrap();
        assert!(rule.rejects(&axes, &[1, 0]));
        assert!(!rule.rejects(&axes, &[0, 0]));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let rule = PruneRule::Deduplicate { threshold: -1.0 };
        assert!(rule.resolve(0, &axes()).is_err());
    }

    #[test]
    fn test_rules_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            rules: Vec<PruneRule>,
        }
        let text = r#"
            [[rules]]
            rule = "forbid"
            selections = { demand = "p90", outage = "full" }

            [[rules]]
            rule = "plausibility_bound"
            max_severity = 1.8
        "#;
        let parsed: Wrapper = toml::from_str(text).unwrap();
        assert_eq!(parsed.rules.len(), 2);
        assert!(matches!(parsed.rules[1], PruneRule::PlausibilityBound { .. }));
    }
}

//! # power_scenarios: Scenario generation and combination
//!
//! ## Layer 2 (Scenarios) Role
//!
//! power_scenarios sits on top of power_core and provides:
//! - Series adjustments (`adjustment`): shifts, stacked de-rates, fuel shocks
//! - Variants and axes (`variant`): `ScenarioVariant`, `ScenarioAxis`
//! - Generators (`generators`): historical percentile, capacity/outage, fuel stress
//! - The combiner (`combiner`): cross product, prune rules, limit policy,
//!   canonical `CombinationId`
//! - Declarative configuration (`config`) and preset axes (`presets`)
//!
//! Everything here is a pure function of its inputs. Combination ids depend
//! only on axis names and variant ids, never on execution order.
//!
//! ## Usage Examples
//!
//! ```rust
//! use power_scenarios::combiner::{combine, CombinerConfig, PruneRule};
//! use power_scenarios::generators::{outage, OutageLevel};
//! use power_scenarios::adjustment::Derate;
//! use power_scenarios::variant::{AxisKind, ScenarioAxis, ScenarioVariant};
//! use power_core::types::DataType;
//! use std::collections::BTreeMap;
//!
//! let levels = vec![
//!     OutageLevel::none("none"),
//!     OutageLevel::single("full", Derate::Multiplicative { remaining: 0.0 }, 1.0),
//! ];
//! let outage_axis = ScenarioAxis::new(
//!     "outage",
//!     AxisKind::Outage,
//!     DataType::Capacity,
//!     outage::generate("outage", &levels).unwrap(),
//! )
//! .unwrap();
//! let demand_axis = ScenarioAxis::new(
//!     "demand",
//!     AxisKind::Percentile,
//!     DataType::Consumption,
//!     ["p10", "p50", "p90"].iter().map(|id| ScenarioVariant::identity(*id)).collect(),
//! )
//! .unwrap();
//!
//! let forbid = PruneRule::Forbid {
//!     selections: BTreeMap::from([
//!         ("demand".to_string(), "p90".to_string()),
//!         ("outage".to_string(), "full".to_string()),
//!     ]),
//! };
//! let set = combine(vec![demand_axis, outage_axis], &[forbid], &CombinerConfig::default()).unwrap();
//! assert_eq!(set.len(), 5);
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod adjustment;
pub mod combiner;
pub mod config;
pub mod error;
pub mod generators;
pub mod presets;
pub mod variant;

pub use adjustment::Adjustment;
pub use combiner::{
    combine, CombinationId, CombinationSet, CombinerConfig, LimitOutcome, LimitPolicy, PruneRule,
    ScenarioCombination, ScenarioCombiner,
};
pub use config::{AxisSpec, ScenarioConfig};
pub use error::{CombinationError, ScenarioError};
pub use generators::{LinearInterpolation, StatisticsProvider};
pub use variant::{AxisKind, ScenarioAxis, ScenarioVariant, VariantParams};

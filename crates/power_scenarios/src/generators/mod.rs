//! Scenario generators.
//!
//! Three independent producers turn parameters (and, for percentiles, a
//! historical series) into scenario variants:
//!
//! ```text
//! percentile   history + levels   -> pNN shifts per market
//! outage       outage levels      -> stacked de-rates
//! fuel         shock specs        -> level or ramp shocks
//! ```
//!
//! Every generator is a pure function of its inputs and is safe to call
//! from several threads at once.

pub mod fuel;
pub mod outage;
pub mod percentile;

pub use fuel::FuelShockSpec;
pub use outage::OutageLevel;
pub use percentile::{
    percentile_id, LinearInterpolation, PercentileGenerator, PercentileParams, StatisticsProvider,
};

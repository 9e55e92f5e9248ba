//! # power_spreads: Spread calculation
//!
//! ## Layer 4 (Analytics) Role
//!
//! power_spreads derives spread series from aggregated forecast curves.
//! It provides:
//! - Spread definitions (`definition`): inter-market, weighted sum, clean spark,
//!   interconnector capacity, calendar and base-peak spreads
//! - Period bucketing (`period`) for the resampled kinds
//! - The calculator (`calculator`), which evaluates every definition for
//!   every combination of a curve set
//!
//! A combination missing an input yields a [`MissingInputError`] instead of
//! a result; other combinations and definitions are unaffected.
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use chrono::{Duration, NaiveDate};
//! use power_core::types::MarketCode;
//! use power_forecast::{aggregate, ForecastCurve};
//! use power_spreads::{compute, SpreadDefinition, SpreadOp};
//!
//! let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let index: Vec<_> = (0..3).map(|h| start + Duration::hours(h)).collect();
//! let curve = |market, values: Vec<f64>| ForecastCurve {
//!     market,
//!     combination: "gas=high".parse().unwrap(),
//!     timestamps: index.clone().into(),
//!     values,
//!     drivers: BTreeMap::new(),
//!     weight: 1.0,
//! };
//! let curves = aggregate(
//!     vec![curve(MarketCode::De, vec![10.0, 12.0, 14.0]), curve(MarketCode::Fr, vec![8.0, 9.0, 10.0])],
//!     vec![],
//! );
//! let spread = SpreadDefinition::InterMarket {
//!     name: "de-fr".into(),
//!     long: MarketCode::De,
//!     short: MarketCode::Fr,
//!     op: SpreadOp::Difference,
//! };
//! let out = compute(&curves, &[spread]);
//! assert_eq!(out.results[0].values, vec![2.0, 3.0, 4.0]);
//! assert!(out.missing.is_empty());
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod calculator;
pub mod definition;
pub mod error;
pub mod period;

pub use calculator::{compute, SpreadCalculator, SpreadOutput, SpreadResult};
pub use definition::{validate_all, Hours, Period, SpreadDefinition, SpreadLeg, SpreadOp};
pub use error::{MissingInput, MissingInputError, SpreadConfigError};

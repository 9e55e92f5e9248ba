//! # power_core: Foundation layer for multi-market power forecasting
//!
//! ## Layer 1 (Foundation) Role
//!
//! power_core is the bottom layer of the workspace, providing:
//! - Market identities and conventions: `MarketCode`, `MarketConfig`, `MarketCatalog` (`types::market`)
//! - Data categories: `DataType` (`types::data_type`)
//! - Time series: `DataSeries` (`types::series`)
//! - Forecast horizons: `DateRange` (`types::horizon`)
//! - The data access contract: `DataProvider`, `DataError` (`data`)
//!
//! Nothing in this crate knows about scenarios, models or spreads. Higher layers
//! receive market configuration and series as plain immutable values.
//!
//! ## Usage Examples
//!
//! ```rust
//! use power_core::types::{DateRange, MarketCatalog, MarketCode};
//! use chrono::NaiveDate;
//!
//! let catalog = MarketCatalog::default_europe();
//! let de = catalog.get(MarketCode::De).unwrap();
//! assert_eq!(de.unit(), "EUR/MWh");
//!
//! let horizon = DateRange::new(
//!     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
//! )
//! .unwrap();
//! assert_eq!(horizon.hourly_index().len(), 48);
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod data;
pub mod types;

pub use data::{DataError, DataProvider, FetchOptions};
pub use types::{DataSeries, DataType, DateRange, MarketCatalog, MarketCode, MarketConfig};

//! Core value types shared by every layer.
//!
//! This module provides:
//! - `MarketCode`, `Currency`, `PeakCalendar`, `MarketConfig`, `MarketCatalog`
//! - `DataType`: the closed set of series categories
//! - `DataSeries`: an ordered, read-only hourly series
//! - `DateRange`: an inclusive date range with an hourly forecast index
//! - Error types: `SeriesError`, `MarketError`, `DateRangeError`

pub mod data_type;
pub mod error;
pub mod horizon;
pub mod market;
pub mod series;

pub use data_type::DataType;
pub use error::{DateRangeError, MarketError, SeriesError};
pub use horizon::DateRange;
pub use market::{Currency, MarketCatalog, MarketCode, MarketConfig, PeakCalendar};
pub use series::DataSeries;

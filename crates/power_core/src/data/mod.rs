//! Data access contract.
//!
//! The forecasting core never talks to databases or feeds directly. It
//! consumes series through the [`DataProvider`] trait:
//!
//! ```text
//! fetch(data_type, market, start, end, opts) -> DataSeries
//! ```
//!
//! Implementations provided here:
//! - [`InMemoryProvider`]: pre-loaded series (tests, embedding)
//! - [`CsvDirectoryProvider`]: one CSV file per `(market, data type)`
//! - [`FreshnessGuard`]: decorator enforcing a maximum data age

mod csv_source;
mod freshness;
mod memory;
mod provider;
mod summary;

pub use csv_source::{series_file_name, write_series_csv, CsvDirectoryProvider};
pub use freshness::FreshnessGuard;
pub use memory::InMemoryProvider;
pub use provider::{DataError, DataProvider, FetchOptions};
pub use summary::{summarize, SeriesSummary};

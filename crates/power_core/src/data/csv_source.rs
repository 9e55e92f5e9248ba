//! CSV directory provider.
//!
//! Layout: one file per `(market, data type)` named `<MARKET>_<datatype>.csv`
//! (for example `DE_price.csv`) with a `timestamp,value` header. Timestamps
//! are naive UTC hours in `%Y-%m-%d %H:%M:%S` or ISO `T`-separated form.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::provider::{DataError, DataProvider, FetchOptions};
use crate::types::{DataSeries, DataType, MarketCode};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize, Serialize)]
struct Row {
    timestamp: String,
    value: f64,
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// File name for a `(market, data type)` pair.
pub fn series_file_name(market: MarketCode, data_type: DataType) -> String {
    format!("{}_{}.csv", market.code(), data_type.as_str())
}

/// Provider reading from a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    root: PathBuf,
}

impl CsvDirectoryProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, market: MarketCode, data_type: DataType) -> PathBuf {
        self.root.join(series_file_name(market, data_type))
    }

    fn read_points(
        &self,
        path: &Path,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDateTime, f64)>, DataError> {
        let unavailable =
            |reason: String| DataError::unavailable(data_type, market, start, end, reason);

        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| unavailable(format!("cannot open {}: {}", path.display(), e)))?;

        let from = start.and_time(NaiveTime::MIN);
        let to = end.and_time(NaiveTime::MIN) + Duration::days(1);
        let mut points = Vec::new();
        for (line, record) in reader.deserialize::<Row>().enumerate() {
            let row = record.map_err(|e| unavailable(format!("row {}: {}", line + 1, e)))?;
            let ts = parse_timestamp(&row.timestamp).ok_or_else(|| {
                unavailable(format!("row {}: bad timestamp '{}'", line + 1, row.timestamp))
            })?;
            if ts >= from && ts < to {
                points.push((ts, row.value));
            }
        }
        Ok(points)
    }
}

impl DataProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        _opts: &FetchOptions,
    ) -> Result<DataSeries, DataError> {
        let path = self.path_for(market, data_type);
        if !path.exists() {
            return Err(DataError::unavailable(
                data_type,
                market,
                start,
                end,
                format!("{} not found", path.display()),
            ));
        }
        let mut points = self.read_points(&path, data_type, market, start, end)?;
        points.sort_by_key(|(ts, _)| *ts);
        if points.is_empty() {
            return Err(DataError::unavailable(
                data_type,
                market,
                start,
                end,
                "no observations in range",
            ));
        }
        tracing::debug!(
            market = %market,
            data_type = %data_type,
            points = points.len(),
            path = %path.display(),
            "loaded csv series"
        );
        DataSeries::new(market, data_type, points).map_err(|source| DataError::Malformed {
            data_type,
            market,
            source,
        })
    }
}

/// Writes `series` into `root` using the provider's file layout.
///
/// Returns the path written.
pub fn write_series_csv(root: &Path, series: &DataSeries) -> Result<PathBuf, csv::Error> {
    let path = root.join(series_file_name(series.market(), series.data_type()));
    let mut writer = csv::Writer::from_path(&path)?;
    for (ts, value) in series.iter() {
        writer.serialize(Row {
            timestamp: ts.format(TIMESTAMP_FORMATS[0]).to_string(),
            value,
        })?;
    }
    writer.flush()?;
    Ok(path)
}

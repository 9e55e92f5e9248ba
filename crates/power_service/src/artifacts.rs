//! Persisted run artifacts.
//!
//! A run directory holds:
//! - `forecast_curves.csv`: one row per (market, combination, timestamp)
//! - `spread_results.csv`: one row per (spread, combination, timestamp)
//! - `combinations.json`: the forecast combinations with weights and digests
//! - `run_summary.json`: the [`RunReport`](crate::report::RunReport)

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use power_core::types::MarketCode;
use power_forecast::ForecastCurveSet;
use power_spreads::SpreadResult;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::orchestrator::RunOutput;

/// Curve table file name.
pub const CURVES_FILE: &str = "forecast_curves.csv";
/// Spread table file name.
pub const SPREADS_FILE: &str = "spread_results.csv";
/// Combination list file name.
pub const COMBINATIONS_FILE: &str = "combinations.json";
/// Summary file name.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// One forecast curve point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveRow {
    /// Market
    pub market: MarketCode,
    /// Combination id
    pub combination: String,
    /// Delivery hour
    pub timestamp: NaiveDateTime,
    /// Predicted price
    pub value: f64,
}

/// One spread point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadRow {
    /// Spread name
    pub spread: String,
    /// Combination id
    pub combination: String,
    /// Timestamp or period start
    pub timestamp: NaiveDateTime,
    /// Spread value
    pub value: f64,
    /// Unit
    pub unit: String,
}

/// Paths written for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    /// Curve table
    pub curves: PathBuf,
    /// Spread table
    pub spreads: PathBuf,
    /// Combination list
    pub combinations: PathBuf,
    /// Summary
    pub summary: PathBuf,
}

/// Writes the curve table; returns the number of rows.
pub fn write_curves(path: &Path, curves: &ForecastCurveSet) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = 0;
    for curve in curves.iter() {
        for (ts, value) in curve.timestamps.iter().zip(&curve.values) {
            writer.serialize(CurveRow {
                market: curve.market,
                combination: curve.combination.to_string(),
                timestamp: *ts,
                value: *value,
            })?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// Reads a curve table.
pub fn read_curves(path: &Path) -> Result<Vec<CurveRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<CurveRow>, csv::Error>>()?;
    Ok(rows)
}

/// Writes the spread table; returns the number of rows.
pub fn write_spreads(path: &Path, spreads: &[SpreadResult]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = 0;
    for result in spreads {
        for (ts, value) in result.timestamps.iter().zip(&result.values) {
            writer.serialize(SpreadRow {
                spread: result.name.clone(),
                combination: result.combination.to_string(),
                timestamp: *ts,
                value: *value,
                unit: result.unit.clone(),
            })?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// Reads a spread table.
pub fn read_spreads(path: &Path) -> Result<Vec<SpreadRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<SpreadRow>, csv::Error>>()?;
    Ok(rows)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Writes every artifact of `output` into `dir`, creating it if needed.
pub fn write_run(dir: &Path, output: &RunOutput) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(dir)?;
    let paths = ArtifactPaths {
        curves: dir.join(CURVES_FILE),
        spreads: dir.join(SPREADS_FILE),
        combinations: dir.join(COMBINATIONS_FILE),
        summary: dir.join(SUMMARY_FILE),
    };
    let curve_rows = write_curves(&paths.curves, &output.curves)?;
    let spread_rows = write_spreads(&paths.spreads, &output.spreads)?;
    write_json(&paths.combinations, &output.combinations)?;
    write_json(&paths.summary, &output.report)?;
    info!(
        dir = %dir.display(),
        curve_rows,
        spread_rows,
        "Run artifacts written"
    );
    Ok(paths)
}

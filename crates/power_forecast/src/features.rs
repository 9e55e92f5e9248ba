//! Feature frames.
//!
//! A [`FeatureFrame`] is a column-major matrix of model inputs over an hourly
//! index for one market. Two frames are built per market:
//!
//! - the training frame: historical drivers over the training window, target
//!   = historical price on the same index
//! - the prediction frame: horizon driver projections with the scenario
//!   combination's adjustments applied
//!
//! Both share the same ordered column list (drivers, then calendar columns),
//! so their schema hash is identical. Scenario adjustments change values, not
//! the schema, which lets every combination of a market reuse one trained model.
//!
//! Driver series are aligned by forward fill; a driver with no observation at
//! or before the first index hour is a [`FeatureError::Alignment`].

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use power_core::types::market::is_weekend;
use power_core::types::{DataSeries, DataType, DateRange, MarketCode, MarketConfig};
use power_scenarios::ScenarioCombination;
use sha2::{Digest, Sha256};

use crate::error::FeatureError;

/// Calendar columns appended after the drivers.
pub const CALENDAR_COLUMNS: [&str; 4] = ["hour_sin", "hour_cos", "is_peak", "is_weekend"];

/// Column-major feature matrix over an hourly index.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureFrame {
    market: MarketCode,
    index: Arc<[NaiveDateTime]>,
    columns: Arc<[String]>,
    data: Vec<Vec<f64>>,
    schema_hash: String,
}

impl FeatureFrame {
    /// Assembles a frame, checking column lengths and finiteness.
    pub fn new(
        market: MarketCode,
        index: Arc<[NaiveDateTime]>,
        columns: Arc<[String]>,
        data: Vec<Vec<f64>>,
    ) -> Result<Self, FeatureError> {
        if columns.len() != data.len() {
            return Err(FeatureError::MalformedColumn {
                column: "*".to_string(),
                message: format!("{} names for {} columns", columns.len(), data.len()),
            });
        }
        for (name, col) in columns.iter().zip(&data) {
            if col.len() != index.len() {
                return Err(FeatureError::MalformedColumn {
                    column: name.clone(),
                    message: format!("{} rows, index has {}", col.len(), index.len()),
                });
            }
            if let Some(pos) = col.iter().position(|v| !v.is_finite()) {
                return Err(FeatureError::MalformedColumn {
                    column: name.clone(),
                    message: format!("non-finite value at {}", index[pos]),
                });
            }
        }
        let schema_hash = schema_hash(&columns);
        Ok(Self {
            market,
            index,
            columns,
            data,
            schema_hash,
        })
    }

    /// Market the frame belongs to.
    pub fn market(&self) -> MarketCode {
        self.market
    }

    /// Row index.
    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    /// Shared handle to the row index.
    pub fn shared_index(&self) -> Arc<[NaiveDateTime]> {
        Arc::clone(&self.index)
    }

    /// Ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column values by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data[i].as_slice())
    }

    /// Column values by position.
    pub fn column_at(&self, i: usize) -> &[f64] {
        &self.data[i]
    }

    /// Hash of the ordered column names.
    pub fn schema_hash(&self) -> &str {
        &self.schema_hash
    }
}

/// SHA-256 hex of the ordered column names.
pub fn schema_hash(columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    for c in columns {
        hasher.update(c.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Series supplied for one market.
#[derive(Clone, Debug)]
pub struct MarketInputs {
    /// Market conventions
    pub config: MarketConfig,
    /// Drivers and price over the training window
    pub history: BTreeMap<DataType, DataSeries>,
    /// Driver projections over the horizon
    pub projections: BTreeMap<DataType, DataSeries>,
}

impl MarketInputs {
    /// Empty inputs for `config`.
    pub fn new(config: MarketConfig) -> Self {
        Self {
            config,
            history: BTreeMap::new(),
            projections: BTreeMap::new(),
        }
    }

    /// Market code.
    pub fn market(&self) -> MarketCode {
        self.config.code
    }
}

/// Training frame plus its target.
#[derive(Clone, Debug)]
pub struct TrainingSet {
    /// Training window
    pub window: DateRange,
    /// Features
    pub frame: FeatureFrame,
    /// Historical price aligned to the frame
    pub target: Vec<f64>,
}

/// Prediction frame plus the adjusted driver values it was built from.
#[derive(Clone, Debug)]
pub struct PredictionInputs {
    /// Features
    pub frame: FeatureFrame,
    /// Scenario-adjusted driver values by type
    pub drivers: BTreeMap<DataType, Vec<f64>>,
}

/// Builds training and prediction frames with a fixed driver list.
#[derive(Clone, Debug)]
pub struct FeatureBuilder {
    drivers: Vec<DataType>,
    columns: Arc<[String]>,
}

impl FeatureBuilder {
    /// Builder for the given drivers, in order.
    pub fn new(drivers: Vec<DataType>) -> Self {
        let columns: Vec<String> = drivers
            .iter()
            .map(|d| d.as_str().to_string())
            .chain(CALENDAR_COLUMNS.iter().map(|c| c.to_string()))
            .collect();
        Self {
            drivers,
            columns: columns.into(),
        }
    }

    /// Driver data types.
    pub fn drivers(&self) -> &[DataType] {
        &self.drivers
    }

    /// Ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Schema hash shared by every frame this builder produces.
    pub fn schema_hash(&self) -> String {
        schema_hash(&self.columns)
    }

    fn calendar(config: &MarketConfig, index: &[NaiveDateTime]) -> [Vec<f64>; 4] {
        let mut sin = Vec::with_capacity(index.len());
        let mut cos = Vec::with_capacity(index.len());
        let mut peak = Vec::with_capacity(index.len());
        let mut weekend = Vec::with_capacity(index.len());
        for ts in index {
            let angle = TAU * f64::from(ts.hour()) / 24.0;
            sin.push(angle.sin());
            cos.push(angle.cos());
            peak.push(if config.calendar.is_peak(*ts) { 1.0 } else { 0.0 });
            weekend.push(if is_weekend(*ts) { 1.0 } else { 0.0 });
        }
        [sin, cos, peak, weekend]
    }

    fn align(
        market: MarketCode,
        data_type: DataType,
        series: Option<&DataSeries>,
        index: &[NaiveDateTime],
    ) -> Result<Vec<f64>, FeatureError> {
        let series = series.ok_or(FeatureError::MissingSeries { market, data_type })?;
        series
            .reindex_ffill(index)
            .map_err(|source| FeatureError::Alignment {
                market,
                data_type,
                source,
            })
    }

    fn assemble(
        &self,
        config: &MarketConfig,
        index: Arc<[NaiveDateTime]>,
        mut driver_cols: Vec<Vec<f64>>,
    ) -> Result<FeatureFrame, FeatureError> {
        driver_cols.extend(Self::calendar(config, &index));
        FeatureFrame::new(config.code, index, Arc::clone(&self.columns), driver_cols)
    }

    /// Training frame over `window` with the historical price as target.
    pub fn training(&self, inputs: &MarketInputs, window: DateRange) -> Result<TrainingSet, FeatureError> {
        let market = inputs.market();
        let index: Arc<[NaiveDateTime]> = window.hourly_index().into();
        let target = Self::align(market, DataType::Price, inputs.history.get(&DataType::Price), &index)?;
        let driver_cols = self
            .drivers
            .iter()
            .map(|d| Self::align(market, *d, inputs.history.get(d), &index))
            .collect::<Result<Vec<_>, _>>()?;
        let frame = self.assemble(&inputs.config, index, driver_cols)?;
        if let Some(pos) = target.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::MalformedColumn {
                column: "price".to_string(),
                message: format!("non-finite target at row {}", pos),
            });
        }
        Ok(TrainingSet {
            window,
            frame,
            target,
        })
    }

    /// Prediction frame over `horizon` with `combination` applied.
    pub fn prediction(
        &self,
        inputs: &MarketInputs,
        horizon: DateRange,
        combination: &ScenarioCombination,
    ) -> Result<PredictionInputs, FeatureError> {
        let market = inputs.market();
        let index: Arc<[NaiveDateTime]> = horizon.hourly_index().into();
        let mut drivers = BTreeMap::new();
        let mut driver_cols = Vec::with_capacity(self.drivers.len());
        for d in &self.drivers {
            let base = inputs
                .projections
                .get(d)
                .ok_or(FeatureError::MissingSeries {
                    market,
                    data_type: *d,
                })?;
            let adjusted = combination.apply(market, base);
            let values = Self::align(market, *d, Some(&adjusted), &index)?;
            drivers.insert(*d, values.clone());
            driver_cols.push(values);
        }
        let frame = self.assemble(&inputs.config, index, driver_cols)?;
        Ok(PredictionInputs { frame, drivers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use power_core::types::MarketCatalog;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn hourly(market: MarketCode, dt: DataType, range: DateRange, value: f64) -> DataSeries {
        DataSeries::new(
            market,
            dt,
            range.hourly_index().into_iter().map(|ts| (ts, value)).collect(),
        )
        .unwrap()
    }

    fn inputs() -> (MarketInputs, DateRange, DateRange) {
        let catalog = MarketCatalog::default_europe();
        let horizon = DateRange::new(d(8), d(9)).unwrap();
        let window = horizon.preceding(7);
        let mut inputs = MarketInputs::new(catalog.get(MarketCode::De).unwrap().clone());
        inputs
            .history
            .insert(DataType::Price, hourly(MarketCode::De, DataType::Price, window, 50.0));
        inputs.history.insert(
            DataType::Consumption,
            hourly(MarketCode::De, DataType::Consumption, window, 60.0),
        );
        inputs.projections.insert(
            DataType::Consumption,
            hourly(MarketCode::De, DataType::Consumption, horizon, 65.0),
        );
        (inputs, horizon, window)
    }

    #[test]
    fn test_training_frame_shape() {
        let (inputs, _, window) = inputs();
        let builder = FeatureBuilder::new(vec![DataType::Consumption]);
        let set = builder.training(&inputs, window).unwrap();
        assert_eq!(set.frame.n_rows(), 7 * 24);
        assert_eq!(set.frame.n_cols(), 5);
        assert_eq!(set.target.len(), 7 * 24);
        assert_eq!(set.frame.columns()[0], "consumption");
    }

    #[test]
    fn test_prediction_frame_shares_schema_and_index() {
        let (inputs, horizon, window) = inputs();
        let builder = FeatureBuilder::new(vec![DataType::Consumption]);
        let train = builder.training(&inputs, window).unwrap();
        let combo = ScenarioCombination::base();
        let pred = builder.prediction(&inputs, horizon, &combo).unwrap();
        assert_eq!(train.frame.schema_hash(), pred.frame.schema_hash());
        assert_eq!(pred.frame.index(), horizon.hourly_index().as_slice());
        assert_eq!(pred.drivers[&DataType::Consumption][0], 65.0);
    }

    #[test]
    fn test_missing_driver_is_error() {
        let (inputs, _, window) = inputs();
        let builder = FeatureBuilder::new(vec![DataType::Wind]);
        let err = builder.training(&inputs, window).unwrap_err();
        assert_eq!(
            err,
            FeatureError::MissingSeries {
                market: MarketCode::De,
                data_type: DataType::Wind
            }
        );
    }

    #[test]
    fn test_leading_gap_is_alignment_error() {
        let (mut inputs, horizon, _) = inputs();
        let late = DataSeries::new(
            MarketCode::De,
            DataType::Consumption,
            vec![(horizon.start_datetime() + Duration::hours(3), 1.0)],
        )
        .unwrap();
        inputs.projections.insert(DataType::Consumption, late);
        let builder = FeatureBuilder::new(vec![DataType::Consumption]);
        let err = builder
            .prediction(&inputs, horizon, &ScenarioCombination::base())
            .unwrap_err();
        assert!(matches!(err, FeatureError::Alignment { .. }));
    }

    #[test]
    fn test_calendar_columns() {
        let (inputs, horizon, _) = inputs();
        let builder = FeatureBuilder::new(vec![DataType::Consumption]);
        let pred = builder
            .prediction(&inputs, horizon, &ScenarioCombination::base())
            .unwrap();
        let peak = pred.frame.column("is_peak").unwrap();
        // 2025-01-08 is a Wednesday: hours 8..20 are peak
        assert_eq!(peak[7], 0.0);
        assert_eq!(peak[8], 1.0);
        assert_eq!(peak[20], 0.0);
        let sin = pred.frame.column("hour_sin").unwrap();
        assert!(sin[0].abs() < 1e-12);
    }

    #[test]
    fn test_schema_hash_depends_on_order() {
        let a = FeatureBuilder::new(vec![DataType::Wind, DataType::Solar]);
        let b = FeatureBuilder::new(vec![DataType::Solar, DataType::Wind]);
        assert_ne!(a.schema_hash(), b.schema_hash());
        assert_eq!(a.schema_hash().len(), 64);
    }
}

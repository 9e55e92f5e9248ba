//! Synthetic market data provider.
//!
//! Generates deterministic hourly series for every data type with daily and
//! weekly seasonality, for demos and tests. Values depend only on the seed,
//! market, data type and hour, so overlapping requests agree.
//!
//! Prices are a noisy function of the same hour's drivers: residual load
//! over available capacity, the marginal gas plant's fuel cost and the
//! carbon price. A regression over the drivers therefore recovers most of
//! the price variance.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use power_core::data::{DataError, DataProvider, FetchOptions};
use power_core::types::{DataSeries, DataType, DateRange, MarketCode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

const EPOCH_YEAR: i32 = 2020;

/// Seeded synthetic provider.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    last_available: Option<NaiveDateTime>,
    gaps: BTreeSet<(MarketCode, DataType)>,
}

impl SyntheticProvider {
    /// Provider with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            last_available: None,
            gaps: BTreeSet::new(),
        }
    }

    /// Truncates every series after `ts`, as if the feed stopped there.
    pub fn with_last_available(mut self, ts: NaiveDateTime) -> Self {
        self.last_available = Some(ts);
        self
    }

    /// Makes one series unavailable.
    pub fn with_gap(mut self, market: MarketCode, data_type: DataType) -> Self {
        self.gaps.insert((market, data_type));
        self
    }

    fn market_scale(market: MarketCode) -> f64 {
        let idx = MarketCode::ALL.iter().position(|m| *m == market).unwrap_or(0);
        1.0 - 0.06 * idx as f64
    }

    fn noise(&self, market: MarketCode, data_type: DataType, day: NaiveDate) -> [f64; 24] {
        let day_number = (day - NaiveDate::from_ymd_opt(EPOCH_YEAR, 1, 1).unwrap_or_default()).num_days();
        let market_idx = MarketCode::ALL.iter().position(|m| *m == market).unwrap_or(0) as u64;
        let type_idx = DataType::ALL.iter().position(|d| *d == data_type).unwrap_or(0) as u64;
        let key = splitmix(self.seed ^ splitmix(market_idx << 8 | type_idx) ^ splitmix(day_number as u64));
        let mut rng = StdRng::seed_from_u64(key);
        let mut out = [0.0; 24];
        for v in out.iter_mut() {
            *v = rng.sample::<f64, _>(StandardNormal);
        }
        out
    }

    fn driver_day(&self, market: MarketCode, data_type: DataType, day: NaiveDate) -> [f64; 24] {
        let scale = Self::market_scale(market);
        let weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        let doy = f64::from(day.ordinal());
        let z = self.noise(market, data_type, day);
        let mut out = [0.0; 24];
        for (h, v) in out.iter_mut().enumerate() {
            let hour = h as f64;
            let daily = (2.0 * PI * (hour - 12.0) / 24.0).cos();
            *v = match data_type {
                DataType::Consumption => {
                    let level = if weekend { 0.88 } else { 1.0 };
                    scale * (52_000.0 * level - 9_000.0 * daily) + 1_200.0 * z[h]
                }
                DataType::Capacity => scale * 78_000.0 + 800.0 * z[h],
                DataType::Wind => {
                    let seasonal = 0.55 + 0.25 * (2.0 * PI * doy / 365.0).cos();
                    (scale * 18_000.0 * seasonal + 2_500.0 * z[h]).max(0.0)
                }
                DataType::Solar => {
                    let daylight = (PI * (hour - 6.0) / 12.0).sin().max(0.0);
                    (scale * 12_000.0 * daylight * (1.0 + 0.1 * z[h])).max(0.0)
                }
                DataType::Gas => 35.0 + 2.0 * (2.0 * PI * doy / 365.0).cos() + 0.8 * z[h],
                DataType::Carbon => 72.0 + 1.5 * z[h],
                DataType::Coal => 110.0 + 2.0 * z[h],
                DataType::Price => 0.0,
            };
        }
        out
    }

    fn price_day(&self, market: MarketCode, day: NaiveDate) -> [f64; 24] {
        let consumption = self.driver_day(market, DataType::Consumption, day);
        let capacity = self.driver_day(market, DataType::Capacity, day);
        let wind = self.driver_day(market, DataType::Wind, day);
        let solar = self.driver_day(market, DataType::Solar, day);
        let gas = self.driver_day(market, DataType::Gas, day);
        let carbon = self.driver_day(market, DataType::Carbon, day);
        let z = self.noise(market, DataType::Price, day);
        let mut out = [0.0; 24];
        for (h, v) in out.iter_mut().enumerate() {
            let residual = (consumption[h] - wind[h] - solar[h]) / capacity[h];
            *v = gas[h] / 0.5 + 0.37 * carbon[h] + 120.0 * (residual - 0.45) + 4.0 * z[h];
        }
        out
    }

    fn day(&self, market: MarketCode, data_type: DataType, day: NaiveDate) -> [f64; 24] {
        match data_type {
            DataType::Price => self.price_day(market, day),
            other => self.driver_day(market, other, day),
        }
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new(7)
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        data_type: DataType,
        market: MarketCode,
        start: NaiveDate,
        end: NaiveDate,
        _opts: &FetchOptions,
    ) -> Result<DataSeries, DataError> {
        if self.gaps.contains(&(market, data_type)) {
            return Err(DataError::unavailable(data_type, market, start, end, "series not generated"));
        }
        let range = DateRange::new(start, end)
            .map_err(|e| DataError::unavailable(data_type, market, start, end, e.to_string()))?;

        let mut points = Vec::with_capacity(range.days() as usize * 24);
        let mut day = range.start();
        while day <= range.end() {
            let base = day.and_time(chrono::NaiveTime::MIN);
            for (h, v) in self.day(market, data_type, day).into_iter().enumerate() {
                let ts = base + Duration::hours(h as i64);
                if self.last_available.map_or(true, |last| ts <= last) {
                    points.push((ts, v));
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        DataSeries::new(market, data_type, points).map_err(|source| DataError::Malformed {
            data_type,
            market,
            source,
        })
    }
}

fn splitmix(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

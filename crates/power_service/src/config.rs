//! Run configuration management.
//!
//! Handles loading a [`RunConfig`] from TOML with `POWERCAST_*` environment
//! variable overrides and up-front validation. Every problem is collected into
//! [`ConfigError::Validation`] before any forecast task runs.
//!
//! ```toml
//! markets = ["DE", "FR"]
//! log_level = "info"
//!
//! [horizon]
//! start = "2025-02-03"
//! end = "2025-02-09"
//!
//! [executor]
//! concurrency = 4
//! thermal_ceiling_c = 83.0
//!
//! [executor.retry]
//! max_attempts = 3
//!
//! [data]
//! freshness_hours = 48
//! source = { type = "synthetic", seed = 7 }
//!
//! [scenarios]
//! max_combinations = 200
//!
//! [[spreads]]
//! kind = "inter_market"
//! name = "de-fr"
//! long = "DE"
//! short = "FR"
//!
//! [output]
//! dir = "out"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use power_core::types::{DateRange, MarketCatalog, MarketCode, MarketConfig};
use power_forecast::ExecutorConfig;
use power_scenarios::ScenarioConfig;
use power_spreads::{validate_all, SpreadDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(String),
    /// Parse error in config file
    #[error("Parse error: {0}")]
    Parse(String),
    /// Validation error
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Where market series come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    /// One `<market>_<data type>.csv` file per series under `dir`
    Csv {
        /// Directory holding the files
        dir: PathBuf,
    },
    /// Deterministic generated series
    Synthetic {
        /// Generator seed
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

fn default_seed() -> u64 {
    7
}

impl Default for DataSource {
    fn default() -> Self {
        Self::Synthetic { seed: default_seed() }
    }
}

/// Data access settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Series source
    pub source: DataSource,
    /// Maximum age of the newest point relative to the request end, in hours
    pub freshness_hours: i64,
    /// Days of history shown by the `summary` command
    pub history_lookback_days: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            freshness_hours: 48,
            history_lookback_days: 365,
        }
    }
}

/// Device temperature source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorConfig {
    /// Hottest GPU-like component reported by the operating system
    Sysinfo,
    /// Constant reading, for machines without sensors
    Fixed {
        /// Reported temperature
        celsius: f64,
    },
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::Sysinfo
    }
}

/// Inclusive forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonConfig {
    /// First delivery day
    pub start: NaiveDate,
    /// Last delivery day
    pub end: NaiveDate,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or_default();
        Self { start, end: start }
    }
}

/// Artifact settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving curve, spread and summary files
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("powercast-out"),
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Markets to forecast
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketCode>,

    /// Forecast horizon
    #[serde(default)]
    pub horizon: HorizonConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Executor, admission, model and retry settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Temperature source for admission
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Data access settings
    #[serde(default)]
    pub data: DataConfig,

    /// Scenario axes, prune rules and combination limit
    #[serde(default)]
    pub scenarios: ScenarioConfig,

    /// Spread definitions
    #[serde(default)]
    pub spreads: Vec<SpreadDefinition>,

    /// Replacements for default market conventions
    #[serde(default)]
    pub market_overrides: Vec<MarketConfig>,

    /// Artifact settings
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_markets() -> Vec<MarketCode> {
    vec![MarketCode::De, MarketCode::Fr]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            markets: default_markets(),
            horizon: HorizonConfig::default(),
            log_level: default_log_level(),
            executor: ExecutorConfig::default(),
            sensor: SensorConfig::default(),
            data: DataConfig::default(),
            scenarios: ScenarioConfig::default(),
            spreads: Vec::new(),
            market_overrides: Vec::new(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn with_env_override(mut self) -> Self {
        if let Some(concurrency) = env_parse("POWERCAST_CONCURRENCY") {
            self.executor.concurrency = concurrency;
        }

        if let Some(ceiling) = env_parse("POWERCAST_THERMAL_CEILING") {
            self.executor.thermal_ceiling_c = ceiling;
        }

        if let Some(max) = env_parse("POWERCAST_MAX_COMBINATIONS") {
            self.scenarios.max_combinations = max;
        }

        if let Ok(dir) = std::env::var("POWERCAST_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("POWERCAST_LOG_LEVEL") {
            self.log_level = level;
        }

        self
    }

    /// The horizon as a date range
    pub fn horizon(&self) -> Result<DateRange, ConfigError> {
        DateRange::new(self.horizon.start, self.horizon.end)
            .map_err(|e| ConfigError::Validation(vec![format!("horizon: {}", e)]))
    }

    /// Default European conventions with configured overrides applied
    pub fn catalog(&self) -> MarketCatalog {
        self.market_overrides
            .iter()
            .cloned()
            .fold(MarketCatalog::default_europe(), MarketCatalog::with_market)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log_level '{}'. Valid values: {:?}",
                self.log_level, valid_log_levels
            ));
        }

        if self.markets.is_empty() {
            errors.push("markets cannot be empty".to_string());
        }
        let mut seen = self.markets.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.markets.len() {
            errors.push("markets contains duplicates".to_string());
        }

        if self.horizon.end < self.horizon.start {
            errors.push(format!(
                "horizon end {} is before start {}",
                self.horizon.end, self.horizon.start
            ));
        }

        if self.data.freshness_hours < 0 {
            errors.push("data.freshness_hours must be >= 0".to_string());
        }
        if let DataSource::Csv { dir } = &self.data.source {
            if dir.as_os_str().is_empty() {
                errors.push("data.source.dir cannot be empty".to_string());
            }
        }
        if let SensorConfig::Fixed { celsius } = self.sensor {
            if !celsius.is_finite() {
                errors.push("sensor.celsius must be finite".to_string());
            }
        }

        for overridden in &self.market_overrides {
            if let Err(e) = overridden.calendar.validate() {
                errors.push(format!("market_overrides {}: {}", overridden.code, e));
            }
        }

        errors.extend(self.executor.validate());
        errors.extend(self.scenarios.validate());
        errors.extend(validate_all(&self.spreads));

        let catalog = self.catalog();
        for spread in &self.spreads {
            for market in spread.markets() {
                if !self.markets.contains(&market) {
                    errors.push(format!(
                        "spread '{}' reads {} which is not a configured market",
                        spread.name(),
                        market
                    ));
                } else if !catalog.contains(market) {
                    errors.push(format!("spread '{}' reads unknown market {}", spread.name(), market));
                }
            }
        }

        if self.output.dir.as_os_str().is_empty() {
            errors.push("output.dir cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load from file with environment overrides and validate
    pub fn load_with_env_and_validate(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.with_env_override();
        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

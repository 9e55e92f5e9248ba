//! Summary command implementation
//!
//! Prints count, coverage and range of every configured market's series
//! over the history lookback window.

use anyhow::Result;
use power_core::data::{summarize, DataProvider, FetchOptions};
use power_core::types::DataType;
use power_service::config::RunConfig;
use power_service::orchestrator::data_provider;

/// Run the summary command
pub fn run(config: &RunConfig) -> Result<()> {
    config.validate()?;
    let horizon = config.horizon()?;
    let window = horizon.preceding(config.data.history_lookback_days);
    let provider = data_provider(config);

    println!(
        "{:<6} {:<12} {:>7} {:<20} {:<20} {:>10} {:>10} {:>10}",
        "market", "data_type", "count", "first", "last", "min", "mean", "max"
    );
    for market in &config.markets {
        for data_type in DataType::ALL {
            let fetched = provider.fetch(data_type, *market, window.start(), window.end(), &FetchOptions::default());
            match fetched.as_ref().ok().and_then(summarize) {
                Some(s) => println!(
                    "{:<6} {:<12} {:>7} {:<20} {:<20} {:>10.2} {:>10.2} {:>10.2}",
                    s.market.code(),
                    s.data_type.as_str(),
                    s.count,
                    s.first,
                    s.last,
                    s.min,
                    s.mean,
                    s.max
                ),
                None => println!(
                    "{:<6} {:<12} {:>7} {}",
                    market.code(),
                    data_type.as_str(),
                    0,
                    fetched.err().map(|e| e.to_string()).unwrap_or_else(|| "empty".to_string())
                ),
            }
        }
    }
    Ok(())
}

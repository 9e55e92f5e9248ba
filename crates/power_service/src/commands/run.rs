//! Run command implementation
//!
//! Forecasts the configured markets under every scenario combination,
//! derives spreads and writes the run artifacts.

use std::path::PathBuf;

use anyhow::Result;
use power_service::artifacts::write_run;
use power_service::config::RunConfig;
use power_service::orchestrator::from_config;
use tracing::{info, warn};

/// Run the run command
pub fn run(mut config: RunConfig, output_dir: Option<PathBuf>) -> Result<()> {
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    config.validate()?;
    let horizon = config.horizon()?;

    info!("Starting forecast run...");
    info!("  Markets: {:?}", config.markets);
    info!("  Horizon: {}", horizon);
    info!("  Output directory: {}", config.output.dir.display());

    let orchestrator = from_config(&config)?;
    let output = orchestrator.get_forecast_curves(&config.markets, horizon, &config.scenarios, &config.spreads)?;
    let paths = write_run(&config.output.dir, &output)?;

    println!(
        "{} curves, {} spreads, {} failures",
        output.report.curves,
        output.report.spreads,
        output.failures.len()
    );
    println!("  curves:  {}", paths.curves.display());
    println!("  spreads: {}", paths.spreads.display());
    println!("  summary: {}", paths.summary.display());

    if let Some(reason) = &output.report.cancelled {
        warn!(reason = %reason, "Run finished early");
    }
    Ok(())
}

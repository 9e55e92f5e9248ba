//! Combinations command implementation
//!
//! Generates the configured scenario axes and prints the combination list
//! without running any forecast.

use anyhow::{bail, Result};
use power_service::config::RunConfig;
use power_service::orchestrator::from_config;

/// Run the combinations command
pub fn run(config: &RunConfig, format: &str) -> Result<()> {
    if !matches!(format, "table" | "json") {
        bail!("Unknown format: {}. Supported: table, json", format);
    }
    config.validate()?;
    let horizon = config.horizon()?;
    let orchestrator = from_config(config)?;
    let (set, failures) = orchestrator.prepare_combinations(&config.markets, horizon, &config.scenarios)?;
    let infos: Vec<_> = set.combinations().iter().map(|c| c.describe()).collect();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        let width = infos.iter().map(|i| i.id.len()).max().unwrap_or(2).max(2);
        println!("{:<width$}  {:<12}  {:>8}  {:>8}", "id", "digest", "weight", "severity", width = width);
        for info in &infos {
            println!(
                "{:<width$}  {:<12}  {:>8.4}  {:>8.2}",
                info.id,
                info.digest,
                info.weight,
                info.severity,
                width = width
            );
        }
        println!(
            "{} combinations (raw {}, pruned {}, collapsed {})",
            set.len(),
            set.raw_count(),
            set.pruned(),
            set.collapsed()
        );
    }
    for failure in &failures {
        eprintln!("warning: {}", failure);
    }
    Ok(())
}

//! Check command implementation

use anyhow::{bail, Result};
use power_service::config::{ConfigError, RunConfig};
use tracing::info;

/// Run the check command
pub fn run(config: &RunConfig) -> Result<()> {
    match config.validate() {
        Ok(()) => {
            info!(
                markets = config.markets.len(),
                axes = config.scenarios.axes.len(),
                rules = config.scenarios.rules.len(),
                spreads = config.spreads.len(),
                concurrency = config.executor.concurrency,
                "Configuration OK"
            );
            println!("Configuration OK");
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            for e in &errors {
                println!("  - {}", e);
            }
            bail!("{} configuration problem(s)", errors.len())
        }
        Err(other) => Err(other.into()),
    }
}

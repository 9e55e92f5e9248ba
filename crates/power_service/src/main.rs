//! Powercast CLI - scenario forecasting runs from the command line
//!
//! # Commands
//!
//! - `powercast run` - Forecast the configured markets and write artifacts
//! - `powercast combinations` - Print the scenario combinations a configuration yields
//! - `powercast summary` - Summarise the configured data source
//! - `powercast check` - Validate the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use power_service::config::RunConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Multi-market power price scenario forecasting
#[derive(Parser)]
#[command(name = "powercast")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "powercast.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast the configured markets and write run artifacts
    Run {
        /// Output directory (overrides output.dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the scenario combinations the configuration yields
    Combinations {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Summarise the configured data source per market and data type
    Summary,

    /// Validate the configuration
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RunConfig::load(&cli.config)?.with_env_override();

    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    let mut filter = EnvFilter::from_default_env();
    for krate in ["power_service", "powercast", "power_forecast", "power_scenarios", "power_spreads", "power_core"] {
        filter = filter.add_directive(format!("{}={}", krate, level).parse()?);
    }
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    info!(config = %cli.config.display(), "Powercast starting");

    match cli.command {
        Commands::Run { output_dir } => commands::run::run(config, output_dir),
        Commands::Combinations { format } => commands::combinations::run(&config, &format),
        Commands::Summary => commands::summary::run(&config),
        Commands::Check => commands::check::run(&config),
    }
}

//! # Telemetry Gateway CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Settings loading and validation
//! - The gateway loop with graceful shutdown
//! - emoncms settings inspection

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_gateway, run_info, run_show_settings, run_validate};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let metrics_port = match &cli.command {
        Commands::Run(args) if args.metrics_port != 0 => Some(args.metrics_port),
        _ => None,
    };
    let log_level = observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port,
        default_log_level: default_log_level(&cli).to_string(),
        log_file: cli.logfile.clone(),
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry gateway starting"
    );

    // Settings only drive the log level when nothing else pins it
    let log_level = (!cli.log_level_pinned()).then_some(log_level);

    let result = match &cli.command {
        Commands::Run(args) => run_gateway(args, log_level).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::ShowSettings(args) => run_show_settings(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

fn default_log_level(cli: &Cli) -> &'static str {
    if cli.quiet {
        return "warn";
    }
    match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

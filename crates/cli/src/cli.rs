//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Telemetry Gateway - relays sensor readings to HTTP collectors
#[derive(Parser, Debug)]
#[command(
    name = "telemetry-gateway",
    author,
    version,
    about = "Telemetry forwarding gateway",
    long_about = "Reads sensor frames from a serial radio bridge or TCP socket feeds,\n\
                  decodes them and relays them, buffered and retried, to emoncms\n\
                  compatible HTTP collectors."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TELEMETRY_GATEWAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TELEMETRY_GATEWAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Append logs to this file instead of stdout
    #[arg(long, global = true, env = "TELEMETRY_GATEWAY_LOGFILE")]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Whether the command line or environment pins the log level
    pub fn log_level_pinned(&self) -> bool {
        self.quiet || self.verbose > 0 || std::env::var_os("RUST_LOG").is_some()
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway
    Run(RunArgs),

    /// Validate a settings file without running
    Validate(ValidateArgs),

    /// Display the components a settings file describes
    Info(InfoArgs),

    /// Fetch settings from emoncms, print them and exit
    ShowSettings(ShowSettingsArgs),
}

/// Where the gateway takes its settings from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Settings file (TOML or JSON), re-read when it changes
    #[arg(
        short,
        long,
        default_value = "gateway.toml",
        env = "TELEMETRY_GATEWAY_SETTINGS"
    )]
    pub settings: PathBuf,

    /// Poll settings from this emoncms instance instead of a file
    #[arg(long, env = "TELEMETRY_GATEWAY_EMONCMS")]
    pub emoncms: Option<String>,

    /// Serial port used for the radio listener built from emoncms settings
    #[arg(long, default_value = "/dev/ttyAMA0", env = "TELEMETRY_GATEWAY_SERIAL_PORT")]
    pub serial_port: String,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Pause between two loop cycles in milliseconds
    #[arg(long, default_value = "200", env = "TELEMETRY_GATEWAY_TICK_MS")]
    pub tick_ms: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TELEMETRY_GATEWAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to settings file to validate
    #[arg(short, long, default_value = "gateway.toml")]
    pub settings: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to settings file
    #[arg(short, long, default_value = "gateway.toml")]
    pub settings: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `show-settings` command
#[derive(Parser, Debug)]
pub struct ShowSettingsArgs {
    /// emoncms base URL
    #[arg(long, default_value = "http://localhost/emoncms", env = "TELEMETRY_GATEWAY_EMONCMS")]
    pub emoncms: String,

    /// Serial port used for the radio listener
    #[arg(long, default_value = "/dev/ttyAMA0", env = "TELEMETRY_GATEWAY_SERIAL_PORT")]
    pub serial_port: String,

    /// Output as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

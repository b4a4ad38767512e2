//! # Observability
//!
//! Tracing + Prometheus metrics.
//!
//! ## Features
//!
//! - Tracing initialization (JSON/Pretty/Compact formats)
//! - Log filter reloadable at runtime (`LogLevelHandle`)
//! - Prometheus metrics export
//! - Gateway counters and gauges (`metrics` module)
//!
//! ## Example
//!
//! ```ignore
//! let handle = observability::init()?;
//!
//! // later, when the settings snapshot carries a new level
//! handle.set_level("debug")?;
//! ```

pub mod metrics;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt, reload, util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

// Re-exports
pub use crate::metrics::{
    record_buffer_depth, record_frame_rejected, record_reading_buffered,
    record_reading_received, record_readings_evicted, record_send_result,
};

/// Initialize observability with defaults (Pretty logs, no Prometheus)
pub fn init() -> Result<LogLevelHandle> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log format
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Default log filter, used when RUST_LOG is not set
    pub default_log_level: String,
    /// Append logs to this file instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_port: None,
            default_log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs
    Json,
    /// Human-readable format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Handle to swap the active log filter after initialization
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    current: Arc<Mutex<String>>,
}

impl LogLevelHandle {
    /// Replace the log filter; unchanged directives are ignored
    ///
    /// Returns true when the filter was actually replaced.
    pub fn set_level(&self, directive: &str) -> Result<bool> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("log level lock poisoned"))?;
        if current.as_str() == directive {
            return Ok(false);
        }

        let filter = EnvFilter::try_new(directive)
            .with_context(|| format!("Invalid log filter '{directive}'"))?;
        self.handle
            .reload(filter)
            .context("Failed to reload log filter")?;
        *current = directive.to_string();
        Ok(true)
    }

    /// Directive currently in effect
    pub fn current(&self) -> String {
        self.current
            .lock()
            .map(|current| current.clone())
            .unwrap_or_default()
    }
}

/// Initialize with custom configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<LogLevelHandle> {
    // 1. Initialize Tracing
    let directive = std::env::var(EnvFilter::DEFAULT_ENV)
        .unwrap_or_else(|_| config.default_log_level.clone());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);

    let writer = log_writer(config.log_file.as_deref())?;
    let ansi = config.log_file.is_none();
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .pretty()
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .compact()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    // 2. Initialize Prometheus Exporter (if enabled)
    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        log_level = %directive,
        metrics_port = ?config.metrics_port,
        log_file = ?config.log_file,
        "Observability initialized"
    );

    Ok(LogLevelHandle {
        handle,
        current: Arc::new(Mutex::new(directive)),
    })
}

/// Log destination: the file opened for appending, or stdout
fn log_writer(path: Option<&Path>) -> Result<BoxMakeWriter> {
    let Some(path) = path else {
        return Ok(BoxMakeWriter::new(std::io::stdout));
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}

/// Initialize Prometheus metrics only (no tracing)
///
/// For cases where tracing is initialized elsewhere.
pub fn init_metrics_only(port: u16) -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

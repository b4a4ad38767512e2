//! `run` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::{EmoncmsEndpoint, EmoncmsSettings, FileSettings};
use contracts::SettingsSource;
use gateway::{DefaultFactory, Gateway};
use observability::LogLevelHandle;
use tracing::{error, info, warn};

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_gateway(args: &RunArgs, log_level: Option<LogLevelHandle>) -> Result<()> {
    // Raised by the signal watcher, checked by the loop between cycles
    let exit = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let exit = Arc::clone(&exit);
        async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping after the current cycle...");
            exit.store(true, Ordering::Relaxed);
        }
    });

    let tick = Duration::from_millis(args.tick_ms);
    match &args.source.emoncms {
        Some(url) => {
            let endpoint = EmoncmsEndpoint::parse(url)
                .with_context(|| format!("Invalid emoncms URL '{url}'"))?;
            info!(
                emoncms = %endpoint.base_url(),
                serial_port = %args.source.serial_port,
                "Polling settings from emoncms"
            );
            let source = EmoncmsSettings::new(endpoint, args.source.serial_port.clone())
                .context("Failed to create emoncms settings source")?;
            run_with(source, tick, log_level, &exit).await;
        }
        None => {
            let path = &args.source.settings;
            if !path.exists() {
                anyhow::bail!("Settings file not found: {}", path.display());
            }
            info!(settings = %path.display(), "Polling settings from file");
            run_with(FileSettings::new(path.clone()), tick, log_level, &exit).await;
        }
    }

    info!("Telemetry gateway finished");
    Ok(())
}

async fn run_with<S: SettingsSource>(
    source: S,
    tick: Duration,
    log_level: Option<LogLevelHandle>,
    exit: &AtomicBool,
) {
    let mut gateway = Gateway::new(source, DefaultFactory).with_tick(tick);
    if let Some(handle) = log_level {
        gateway = gateway.with_log_level(handle);
    }
    gateway.run(exit).await;
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BufferSpec, GatewaySettings, ListenerSpec};
use serde::Serialize;

use crate::cli::InfoArgs;
use crate::commands::load_settings;

/// Settings overview for display
#[derive(Serialize)]
struct SettingsInfo {
    settings_path: String,
    log_level: String,
    listeners: Vec<ListenerInfo>,
    buffers: Vec<BufferInfo>,
}

#[derive(Serialize)]
struct ListenerInfo {
    name: String,
    kind: String,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeater_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_broadcast_secs: Option<u64>,
}

#[derive(Serialize)]
struct BufferInfo {
    name: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<String>,
    active: bool,
    flush_period: f64,
    batch_size: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let settings = load_settings(&args.settings)?;
    let info = build_settings_info(&args.settings.display().to_string(), &settings);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize settings info")?;
        println!("{}", json);
    } else {
        print_settings_info(&info);
    }

    Ok(())
}

fn build_settings_info(settings_path: &str, settings: &GatewaySettings) -> SettingsInfo {
    let listeners = settings
        .listeners
        .iter()
        .map(|(name, spec)| match spec {
            ListenerSpec::Radio {
                init_settings,
                runtime_settings,
            } => ListenerInfo {
                name: name.clone(),
                kind: spec.kind().to_string(),
                source: format!("{} @ {} baud", init_settings.port, init_settings.baud_rate),
                repeater_port: init_settings.repeater_port,
                time_broadcast_secs: (runtime_settings.send_time_interval > 0)
                    .then_some(runtime_settings.send_time_interval),
            },
            ListenerSpec::Socket { init_settings, .. } => ListenerInfo {
                name: name.clone(),
                kind: spec.kind().to_string(),
                source: format!("tcp {}:{}", init_settings.bind_address, init_settings.port),
                repeater_port: None,
                time_broadcast_secs: None,
            },
        })
        .collect();

    let buffers = settings
        .buffers
        .iter()
        .map(|(name, spec)| {
            let flush = spec.flush_settings();
            let destination = match spec {
                BufferSpec::Emoncms {
                    runtime_settings, ..
                } => Some(runtime_settings.base_url()),
                BufferSpec::Log { .. } => None,
            };
            BufferInfo {
                name: name.clone(),
                kind: spec.kind().to_string(),
                destination,
                active: flush.active,
                flush_period: flush.flush_period,
                batch_size: flush.batch_size,
            }
        })
        .collect();

    SettingsInfo {
        settings_path: settings_path.to_string(),
        log_level: settings.gateway.log_level.clone(),
        listeners,
        buffers,
    }
}

fn print_settings_info(info: &SettingsInfo) {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║                  Telemetry Gateway Settings                ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("Settings: {}", info.settings_path);
    println!("Log level: {}", info.log_level);
    println!();

    println!("┌─ Listeners ({}) ─────────────────────────────────────────", info.listeners.len());
    for listener in &info.listeners {
        println!("│");
        println!("│  {} [{}]", listener.name, listener.kind);
        println!("│    Source: {}", listener.source);
        if let Some(port) = listener.repeater_port {
            println!("│    Repeater: tcp port {}", port);
        }
        if let Some(secs) = listener.time_broadcast_secs {
            println!("│    Time broadcast: every {}s", secs);
        }
    }
    println!("└─────────────────────────────────────────────────────────────");
    println!();

    println!("┌─ Buffers ({}) ───────────────────────────────────────────", info.buffers.len());
    for buffer in &info.buffers {
        println!("│");
        let state = if buffer.active { "active" } else { "inactive" };
        println!("│  {} [{}] ({})", buffer.name, buffer.kind, state);
        if let Some(ref destination) = buffer.destination {
            println!("│    Destination: {}", destination);
        }
        println!(
            "│    Flush: every {}s, {} reading(s) per request",
            buffer.flush_period, buffer.batch_size
        );
    }
    println!("└─────────────────────────────────────────────────────────────");
}

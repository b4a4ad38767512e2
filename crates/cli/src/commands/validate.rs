//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BufferSpec, GatewaySettings, ListenerSpec};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::commands::load_settings;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    settings_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SettingsSummary>,
}

#[derive(Serialize)]
struct SettingsSummary {
    log_level: String,
    listener_count: usize,
    buffer_count: usize,
    active_buffer_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(settings = %args.settings.display(), "Validating settings");

    let result = validate_settings(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Settings validation failed")
    }
}

fn validate_settings(args: &ValidateArgs) -> ValidationResult {
    let settings_path = args.settings.display().to_string();

    match load_settings(&args.settings) {
        Ok(settings) => {
            let warnings = collect_warnings(&settings);
            ValidationResult {
                valid: true,
                settings_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(SettingsSummary {
                    log_level: settings.gateway.log_level.clone(),
                    listener_count: settings.listeners.len(),
                    buffer_count: settings.buffers.len(),
                    active_buffer_count: settings
                        .buffers
                        .values()
                        .filter(|spec| spec.flush_settings().active)
                        .count(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            settings_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect settings warnings (non-fatal issues)
fn collect_warnings(settings: &GatewaySettings) -> Vec<String> {
    let mut warnings = Vec::new();

    if settings.listeners.is_empty() {
        warnings.push("No listeners configured - nothing will be received".to_string());
    }

    if settings.buffers.is_empty() {
        warnings.push("No buffers configured - readings will be dropped".to_string());
    } else if settings
        .buffers
        .values()
        .all(|spec| !spec.flush_settings().active)
    {
        warnings.push("Every buffer is inactive - readings will be dropped".to_string());
    }

    for (name, spec) in &settings.buffers {
        if let BufferSpec::Emoncms {
            runtime_settings, ..
        } = spec
        {
            if runtime_settings.api_key.is_empty() {
                warnings.push(format!("Buffer '{name}' has no API key"));
            }
        }
    }

    for (name, spec) in &settings.listeners {
        if let ListenerSpec::Radio {
            runtime_settings, ..
        } = spec
        {
            if runtime_settings.baseid.is_none() {
                warnings.push(format!(
                    "Radio listener '{name}' has no baseid - the bridge keeps its current one"
                ));
            }
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Settings are valid: {}", result.settings_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Log level: {}", summary.log_level);
            println!("  Listeners: {}", summary.listener_count);
            println!(
                "  Buffers: {} ({} active)",
                summary.buffer_count, summary.active_buffer_count
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Settings are invalid: {}", result.settings_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

//! Settings validation
//!
//! Rules:
//! - component names are non-empty
//! - typed field ranges (via `validator` derive)
//! - radio frequency is a known band code
//! - destination protocol is http:// or https://, path is empty or starts with '/'
//! - TCP ports are not claimed twice on the same bind address

use std::collections::HashSet;

use contracts::{
    BufferSpec, ContractError, GatewaySettings, ListenerSpec, RADIO_FREQUENCY_BANDS,
};
use validator::Validate;

/// Validate a settings snapshot
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(settings: &GatewaySettings) -> Result<(), ContractError> {
    validate_gateway(settings)?;
    validate_listeners(settings)?;
    validate_listener_ports(settings)?;
    validate_buffers(settings)?;
    Ok(())
}

fn check(field: String, value: &impl Validate) -> Result<(), ContractError> {
    value
        .validate()
        .map_err(|e| ContractError::config_validation(field, e.to_string()))
}

fn validate_gateway(settings: &GatewaySettings) -> Result<(), ContractError> {
    if settings.gateway.log_level.trim().is_empty() {
        return Err(ContractError::config_validation(
            "gateway.loglevel",
            "log level cannot be empty",
        ));
    }
    Ok(())
}

fn validate_listeners(settings: &GatewaySettings) -> Result<(), ContractError> {
    for (name, spec) in &settings.listeners {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "listeners",
                "listener name cannot be empty",
            ));
        }

        match spec {
            ListenerSpec::Radio {
                init_settings,
                runtime_settings,
            } => {
                check(format!("listeners.{name}.init_settings"), init_settings)?;
                check(
                    format!("listeners.{name}.runtime_settings"),
                    runtime_settings,
                )?;
                if let Some(frequency) = runtime_settings.frequency {
                    if !RADIO_FREQUENCY_BANDS.contains(&frequency) {
                        return Err(ContractError::config_validation(
                            format!("listeners.{name}.runtime_settings.frequency"),
                            format!(
                                "unknown frequency band {frequency}, expected one of {RADIO_FREQUENCY_BANDS:?}"
                            ),
                        ));
                    }
                }
            }
            ListenerSpec::Socket { init_settings, .. } => {
                check(format!("listeners.{name}.init_settings"), init_settings)?;
            }
        }
    }
    Ok(())
}

/// Socket listeners and radio repeaters both bind TCP ports
fn validate_listener_ports(settings: &GatewaySettings) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (name, spec) in &settings.listeners {
        let claimed = match spec {
            ListenerSpec::Socket { init_settings, .. } => {
                Some((init_settings.bind_address.as_str(), init_settings.port))
            }
            ListenerSpec::Radio { init_settings, .. } => init_settings
                .repeater_port
                .map(|port| ("0.0.0.0", port)),
        };

        if let Some((address, port)) = claimed {
            if !seen.insert((address, port)) {
                return Err(ContractError::config_validation(
                    format!("listeners.{name}"),
                    format!("duplicate tcp port {address}:{port}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_buffers(settings: &GatewaySettings) -> Result<(), ContractError> {
    for (name, spec) in &settings.buffers {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "buffers",
                "buffer name cannot be empty",
            ));
        }

        match spec {
            BufferSpec::Emoncms {
                init_settings,
                runtime_settings,
            } => {
                check(format!("buffers.{name}.init_settings"), init_settings)?;
                check(format!("buffers.{name}.runtime_settings"), runtime_settings)?;

                if !matches!(runtime_settings.protocol.as_str(), "http://" | "https://") {
                    return Err(ContractError::config_validation(
                        format!("buffers.{name}.runtime_settings.protocol"),
                        format!(
                            "protocol must be 'http://' or 'https://', got '{}'",
                            runtime_settings.protocol
                        ),
                    ));
                }

                let path = &runtime_settings.path;
                if !path.is_empty() && !path.starts_with('/') {
                    return Err(ContractError::config_validation(
                        format!("buffers.{name}.runtime_settings.path"),
                        format!("path must start with '/', got '{path}'"),
                    ));
                }
            }
            BufferSpec::Log { runtime_settings } => {
                check(format!("buffers.{name}.runtime_settings"), runtime_settings)?;
            }
        }
    }
    Ok(())
}

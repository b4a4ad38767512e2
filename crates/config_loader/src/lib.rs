//! # Config Loader
//!
//! Settings loading, validation and the settings sources polled by the gateway.
//!
//! Responsibilities:
//! - Parse TOML/JSON settings files
//! - Validate settings legality
//! - Produce `GatewaySettings`
//! - Poll settings from a file or from an emoncms instance
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_from_path(Path::new("gateway.toml")).unwrap();
//! println!("Listeners: {}", settings.listeners.len());
//! ```

mod emoncms;
mod file_source;
mod memory_source;
mod parser;
mod validator;

pub use contracts::GatewaySettings;
pub use emoncms::{EmoncmsEndpoint, EmoncmsSettings};
pub use file_source::FileSettings;
pub use memory_source::MemorySettings;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Settings loader
///
/// Provides static methods to load settings from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<GatewaySettings, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load settings from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<GatewaySettings, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already-built snapshot (e.g. one mapped from a remote source)
    pub fn validate(settings: &GatewaySettings) -> Result<(), ContractError> {
        validator::validate(settings)
    }

    /// Serialize settings to TOML string
    pub fn to_toml(settings: &GatewaySettings) -> Result<String, ContractError> {
        toml::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize settings to JSON string
    pub fn to_json(settings: &GatewaySettings) -> Result<String, ContractError> {
        serde_json::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer settings format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read settings file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate settings content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<GatewaySettings, ContractError> {
        let settings = parser::parse(content, format)?;
        validator::validate(&settings)?;
        Ok(settings)
    }
}

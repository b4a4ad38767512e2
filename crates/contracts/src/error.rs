//! Layered error definitions
//!
//! Categorized by source: config / settings / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Settings Source Errors =====
    /// Remote settings could not be fetched or understood
    #[error("settings source '{source_name}' error: {message}")]
    SettingsFetch {
        source_name: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create settings fetch error
    pub fn settings_fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SettingsFetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

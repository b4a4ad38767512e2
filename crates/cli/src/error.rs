//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Settings file not found
    #[error("Settings file not found: {path}")]
    SettingsNotFound { path: String },

    /// Settings could not be loaded or failed validation
    #[error("Invalid settings: {0}")]
    Settings(#[from] contracts::ContractError),
}

impl CliError {
    pub fn settings_not_found(path: impl Into<String>) -> Self {
        Self::SettingsNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

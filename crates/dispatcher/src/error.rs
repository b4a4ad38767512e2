//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Uplink creation error
    #[error("failed to create uplink '{name}': {message}")]
    UplinkCreation { name: String, message: String },
}

impl DispatcherError {
    /// Create an uplink creation error
    pub fn uplink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UplinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

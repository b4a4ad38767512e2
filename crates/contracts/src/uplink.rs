//! Uplink trait - dispatcher output interface
//!
//! An uplink turns a batch of buffered readings into one request against a
//! destination and reports whether the destination accepted it.

use thiserror::Error;

use crate::{DestinationConfig, TimestampedReading};

/// Why a send was not accepted
///
/// Every variant is transient from the dispatcher's point of view: the batch
/// stays buffered and is retried on the next flush opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Destination answered with a non-success HTTP status
    #[error("http error: status {status}")]
    Http { status: u16 },

    /// Connection could not be established or was interrupted (incl. timeouts)
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// Destination answered, but not with the expected acknowledgement
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Anything not covered above
    #[error("unexpected error: {detail}")]
    Unexpected { detail: String },
}

impl SendError {
    /// Create transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create unexpected error
    pub fn unexpected(detail: impl Into<String>) -> Self {
        Self::Unexpected {
            detail: detail.into(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Unexpected { .. } => "unexpected",
        }
    }
}

/// Destination output trait
///
/// All uplink implementations must implement this trait.
#[trait_variant::make(Uplink: Send)]
pub trait LocalUplink {
    /// Uplink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send one batch, oldest reading first
    ///
    /// `now` is the wall-clock time (seconds since epoch) the request is built at.
    ///
    /// # Errors
    /// Returns the classified failure; the caller keeps the batch buffered.
    async fn send(&mut self, batch: &[TimestampedReading], now: f64) -> Result<(), SendError>;

    /// Take a new destination into use for the following sends
    ///
    /// Uplinks without a remote destination ignore this.
    fn set_destination(&mut self, destination: &DestinationConfig);
}

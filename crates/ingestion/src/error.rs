//! Ingestion error types

use std::error::Error as StdError;

use thiserror::Error;

/// Why a line could not be turned into a reading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Line held no tokens
    #[error("empty frame")]
    Empty,

    /// Fewer tokens than the frame shape needs
    #[error("too few tokens: got {count}, need at least {min}")]
    TooFewTokens { count: usize, min: usize },

    /// Packed-byte frames are a node id followed by lsb/msb pairs
    #[error("even token count {count}: expected node id followed by lsb/msb pairs")]
    EvenTokenCount { count: usize },

    /// Token is not a decimal integer in range
    #[error("non-numeric token '{token}'")]
    NotNumeric { token: String },
}

impl DecodeError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooFewTokens { .. } => "too_few_tokens",
            Self::EvenTokenCount { .. } => "even_token_count",
            Self::NotNumeric { .. } => "not_numeric",
        }
    }
}

/// Listener lifecycle errors
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Transport could not be acquired
    #[error("listener '{listener}' failed to open {target}: {source}")]
    Init {
        listener: String,
        target: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Settings of another listener type were applied
    #[error("listener '{listener}' is a {actual} listener, got {expected} settings")]
    KindMismatch {
        listener: String,
        actual: &'static str,
        expected: &'static str,
    },
}

impl ListenerError {
    /// Create init error
    pub fn init(
        listener: impl Into<String>,
        target: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Init {
            listener: listener.into(),
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, ListenerError>;

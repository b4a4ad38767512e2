//! # Dispatcher
//!
//! Delivery of readings to destinations.
//!
//! Responsibilities:
//! - Buffer timestamped readings per destination (bounded, oldest evicted)
//! - Decide when a flush is due
//! - Send the oldest batch and keep it on failure

pub mod buffer;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod uplinks;

pub use buffer::{BoundedBuffer, MAX_BUFFERED};
pub use contracts::{SendError, TimestampedReading, Uplink};
pub use dispatcher::{open_dispatcher, unix_now, Dispatcher, FlushOutcome};
pub use error::DispatcherError;
pub use metrics::{DispatcherStats, StatsSnapshot};
pub use uplinks::{AnyUplink, EmoncmsUplink, LogUplink};

//! LogUplink - logs readings via tracing

use contracts::{DestinationConfig, SendError, TimestampedReading, Uplink};
use tracing::{info, instrument};

/// Uplink that logs every reading and always succeeds
#[derive(Debug)]
pub struct LogUplink {
    name: String,
}

impl LogUplink {
    /// Create a new LogUplink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Uplink for LogUplink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_uplink_send",
        skip(self, batch, now),
        fields(uplink = %self.name, items = batch.len())
    )]
    async fn send(&mut self, batch: &[TimestampedReading], now: f64) -> Result<(), SendError> {
        for item in batch {
            info!(
                uplink = %self.name,
                node = item.reading.node_id,
                values = ?item.reading.values,
                age_secs = now - item.timestamp,
                "Reading"
            );
        }
        Ok(())
    }

    fn set_destination(&mut self, _destination: &DestinationConfig) {}
}

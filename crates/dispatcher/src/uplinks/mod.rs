//! Uplink implementations

mod emoncms;
mod log;

pub use emoncms::{bulk_url, single_url, EmoncmsUplink};
pub use log::LogUplink;

use contracts::{BufferSpec, DestinationConfig, SendError, TimestampedReading, Uplink};

use crate::error::DispatcherError;

/// Uplink selected by the buffer `type`
#[derive(Debug)]
pub enum AnyUplink {
    Emoncms(EmoncmsUplink),
    Log(LogUplink),
}

impl AnyUplink {
    /// Build the uplink a buffer spec describes
    pub fn from_spec(name: &str, spec: &BufferSpec) -> Result<Self, DispatcherError> {
        match spec {
            BufferSpec::Emoncms {
                init_settings,
                runtime_settings,
            } => Ok(Self::Emoncms(EmoncmsUplink::new(
                name,
                init_settings,
                runtime_settings.clone(),
            )?)),
            BufferSpec::Log { .. } => Ok(Self::Log(LogUplink::new(name))),
        }
    }
}

impl Uplink for AnyUplink {
    fn name(&self) -> &str {
        match self {
            Self::Emoncms(uplink) => uplink.name(),
            Self::Log(uplink) => uplink.name(),
        }
    }

    async fn send(&mut self, batch: &[TimestampedReading], now: f64) -> Result<(), SendError> {
        match self {
            Self::Emoncms(uplink) => uplink.send(batch, now).await,
            Self::Log(uplink) => uplink.send(batch, now).await,
        }
    }

    fn set_destination(&mut self, destination: &DestinationConfig) {
        match self {
            Self::Emoncms(uplink) => uplink.set_destination(destination),
            Self::Log(uplink) => uplink.set_destination(destination),
        }
    }
}

//! Listener trait and construction from settings

use std::time::Instant;

use contracts::{ListenerSpec, Reading};
use observability::{record_frame_rejected, record_reading_received};
use tracing::{debug, instrument, warn};

use crate::decoder::{decode, Frame, FrameShape};
use crate::error::{ListenerError, Result};
use crate::radio::RadioListener;
use crate::socket::SocketListener;

/// A data source driven by the gateway loop
///
/// Every method returns promptly; nothing here waits on the transport.
pub trait Listener: Send {
    /// Configured name
    fn name(&self) -> &str;

    /// Listener type tag, as used in settings
    fn kind(&self) -> &'static str;

    /// Whether the transport is still held
    fn is_open(&self) -> bool;

    /// Take in available bytes and decode at most one line
    fn read(&mut self) -> Option<Reading>;

    /// Apply runtime settings; unchanged values are not re-applied
    fn set(&mut self, spec: &ListenerSpec, now: Instant) -> Result<()>;

    /// Time-driven side effects
    fn run(&mut self, _now: Instant) {}

    /// Release the transport. Safe to call more than once.
    fn close(&mut self);
}

/// Open the listener described by `spec` and apply its runtime settings
#[instrument(name = "listener_open", skip(spec, now), fields(listener_type = spec.kind()))]
pub fn open_listener(name: &str, spec: &ListenerSpec, now: Instant) -> Result<Box<dyn Listener>> {
    let mut listener: Box<dyn Listener> = match spec {
        ListenerSpec::Radio { init_settings, .. } => {
            Box::new(RadioListener::open(name, init_settings)?)
        }
        ListenerSpec::Socket { init_settings, .. } => {
            Box::new(SocketListener::open(name, init_settings)?)
        }
    };
    listener.set(spec, now)?;
    Ok(listener)
}

pub(crate) fn kind_mismatch(listener: &dyn Listener, spec: &ListenerSpec) -> ListenerError {
    ListenerError::KindMismatch {
        listener: listener.name().to_string(),
        actual: listener.kind(),
        expected: spec.kind(),
    }
}

/// Decode one received line, logging and counting the outcome
pub(crate) fn decode_line(listener: &str, line: &str, shape: FrameShape) -> Option<Reading> {
    match decode(line, shape) {
        Ok(Frame::Reading(reading)) => {
            debug!(listener, node = reading.node_id, values = ?reading.values, "RX");
            record_reading_received(listener);
            Some(reading)
        }
        Ok(Frame::Info(text)) => {
            debug!(listener, %text, "RX info");
            None
        }
        Err(e) => {
            warn!(listener, frame = %line, error = %e, "Malformed RX frame");
            record_frame_rejected(listener, e.kind());
            None
        }
    }
}

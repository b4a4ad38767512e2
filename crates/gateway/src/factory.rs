//! Component construction
//!
//! The registry builds listeners and dispatchers through a factory so the
//! transports and uplinks can be swapped out in tests.

use std::time::Instant;

use contracts::{BufferSpec, ListenerSpec, Uplink};
use dispatcher::{AnyUplink, Dispatcher, DispatcherError};
use ingestion::{Listener, ListenerError};

/// Builds components from their settings
pub trait ComponentFactory {
    /// Uplink type of the dispatchers built
    type Uplink: Uplink;

    /// Open a listener and apply its runtime settings
    fn open_listener(
        &mut self,
        name: &str,
        spec: &ListenerSpec,
        now: Instant,
    ) -> Result<Box<dyn Listener>, ListenerError>;

    /// Build a dispatcher
    fn open_dispatcher(
        &mut self,
        name: &str,
        spec: &BufferSpec,
    ) -> Result<Dispatcher<Self::Uplink>, DispatcherError>;
}

/// Real serial ports, sockets and HTTP uplinks
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFactory;

impl ComponentFactory for DefaultFactory {
    type Uplink = AnyUplink;

    fn open_listener(
        &mut self,
        name: &str,
        spec: &ListenerSpec,
        now: Instant,
    ) -> Result<Box<dyn Listener>, ListenerError> {
        ingestion::open_listener(name, spec, now)
    }

    fn open_dispatcher(
        &mut self,
        name: &str,
        spec: &BufferSpec,
    ) -> Result<Dispatcher<AnyUplink>, DispatcherError> {
        dispatcher::open_dispatcher(name, spec)
    }
}

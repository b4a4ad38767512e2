//! Test doubles for the registry and engine

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::time::{Duration, Instant};

use contracts::{
    BufferSpec, DestinationConfig, FlushSettings, GatewaySettings, ListenerSpec, RadioInit,
    RadioRuntime, Reading, SendError, TimestampedReading, Uplink,
};
use dispatcher::{Dispatcher, DispatcherError};
use ingestion::{Listener, ListenerError, MemoryLink, RadioListener};

use crate::factory::ComponentFactory;

/// Uplink that accepts everything and keeps what it was sent
#[derive(Debug, Default)]
pub struct RecordingUplink {
    pub delivered: Vec<Reading>,
    pub destination: Option<DestinationConfig>,
}

impl Uplink for RecordingUplink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&mut self, batch: &[TimestampedReading], _now: f64) -> Result<(), SendError> {
        self.delivered
            .extend(batch.iter().map(|item| item.reading.clone()));
        Ok(())
    }

    fn set_destination(&mut self, destination: &DestinationConfig) {
        self.destination = Some(destination.clone());
    }
}

/// Builds radio listeners on in-memory links and recording dispatchers
#[derive(Default)]
pub struct TestFactory {
    links: BTreeMap<String, MemoryLink>,
    pub listener_opens: usize,
    pub dispatcher_opens: usize,
    pub unavailable: BTreeSet<String>,
}

impl TestFactory {
    /// Link of the most recently opened listener with this name
    pub fn link(&self, name: &str) -> MemoryLink {
        self.links.get(name).cloned().unwrap_or_default()
    }
}

impl ComponentFactory for TestFactory {
    type Uplink = RecordingUplink;

    fn open_listener(
        &mut self,
        name: &str,
        spec: &ListenerSpec,
        now: Instant,
    ) -> Result<Box<dyn Listener>, ListenerError> {
        if self.unavailable.contains(name) {
            return Err(ListenerError::init(
                name,
                "test link",
                io::Error::other("unavailable"),
            ));
        }
        self.listener_opens += 1;

        let link = MemoryLink::new();
        self.links.insert(name.to_string(), link.clone());
        let mut listener = RadioListener::with_link(name, link).with_settle_time(Duration::ZERO);
        listener.set(spec, now)?;
        Ok(Box::new(listener))
    }

    fn open_dispatcher(
        &mut self,
        name: &str,
        spec: &BufferSpec,
    ) -> Result<Dispatcher<RecordingUplink>, DispatcherError> {
        self.dispatcher_opens += 1;
        Ok(Dispatcher::new(
            name,
            RecordingUplink::default(),
            spec.flush_settings(),
        ))
    }
}

pub fn radio_spec(port: &str, baseid: u8) -> ListenerSpec {
    ListenerSpec::Radio {
        init_settings: RadioInit {
            port: port.into(),
            ..RadioInit::default()
        },
        runtime_settings: RadioRuntime {
            baseid: Some(baseid),
            ..RadioRuntime::default()
        },
    }
}

pub fn log_buffer(flush_period: f64, active: bool) -> BufferSpec {
    BufferSpec::Log {
        runtime_settings: FlushSettings {
            flush_period,
            active,
            batch_size: 1,
        },
    }
}

pub fn settings<const L: usize, const B: usize>(
    listeners: [(&str, ListenerSpec); L],
    buffers: [(&str, BufferSpec); B],
) -> GatewaySettings {
    GatewaySettings {
        listeners: listeners
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect(),
        buffers: buffers
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect(),
        ..Default::default()
    }
}

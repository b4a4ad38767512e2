//! Component registry
//!
//! Holds the live listeners and dispatchers and brings them in line with
//! each new settings snapshot:
//! - new names are built
//! - same type and init settings: runtime settings are applied in place
//! - changed type or init settings: closed and rebuilt
//! - names no longer present: closed and dropped
//!
//! A component that fails to build keeps its slot empty and is retried on
//! the next snapshot.

use std::collections::BTreeMap;
use std::time::Instant;

use contracts::{BufferSpec, GatewaySettings, ListenerSpec, Uplink};
use dispatcher::{Dispatcher, FlushOutcome, StatsSnapshot};
use ingestion::Listener;
use tracing::{error, info, warn};

use crate::factory::ComponentFactory;

struct ListenerSlot {
    spec: ListenerSpec,
    listener: Option<Box<dyn Listener>>,
}

struct DispatcherSlot<U> {
    spec: BufferSpec,
    dispatcher: Option<Dispatcher<U>>,
}

/// Live components keyed by name
pub struct Registry<U> {
    listeners: BTreeMap<String, ListenerSlot>,
    dispatchers: BTreeMap<String, DispatcherSlot<U>>,
}

impl<U> Default for Registry<U> {
    fn default() -> Self {
        Self {
            listeners: BTreeMap::new(),
            dispatchers: BTreeMap::new(),
        }
    }
}

impl<U: Uplink> Registry<U> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring components in line with `settings`
    pub fn reconcile<F>(&mut self, settings: &GatewaySettings, factory: &mut F, now: Instant)
    where
        F: ComponentFactory<Uplink = U>,
    {
        self.reconcile_listeners(&settings.listeners, factory, now);
        self.reconcile_dispatchers(&settings.buffers, factory);
    }

    fn reconcile_listeners<F>(
        &mut self,
        specs: &BTreeMap<String, ListenerSpec>,
        factory: &mut F,
        now: Instant,
    ) where
        F: ComponentFactory<Uplink = U>,
    {
        self.listeners.retain(|name, slot| {
            let keep = specs.contains_key(name);
            if !keep {
                if let Some(listener) = slot.listener.as_mut() {
                    listener.close();
                }
                info!(listener = %name, "Listener removed");
            }
            keep
        });

        for (name, spec) in specs {
            let Some(slot) = self.listeners.get_mut(name) else {
                let listener = build_listener(factory, name, spec, now);
                self.listeners.insert(
                    name.clone(),
                    ListenerSlot {
                        spec: spec.clone(),
                        listener,
                    },
                );
                continue;
            };

            let reusable = slot.listener.is_some() && slot.spec.same_init(spec);
            if reusable {
                if let Some(listener) = slot.listener.as_mut() {
                    if let Err(e) = listener.set(spec, now) {
                        warn!(listener = %name, error = %e, "Couldn't apply listener settings");
                    }
                }
            } else {
                if let Some(mut old) = slot.listener.take() {
                    old.close();
                    info!(listener = %name, "Listener init settings changed, rebuilding");
                }
                slot.listener = build_listener(factory, name, spec, now);
            }
            slot.spec = spec.clone();
        }
    }

    fn reconcile_dispatchers<F>(&mut self, specs: &BTreeMap<String, BufferSpec>, factory: &mut F)
    where
        F: ComponentFactory<Uplink = U>,
    {
        self.dispatchers.retain(|name, slot| {
            let keep = specs.contains_key(name);
            if !keep {
                let pending = slot.dispatcher.as_ref().map_or(0, Dispatcher::buffered);
                info!(dispatcher = %name, dropped = pending, "Dispatcher removed");
            }
            keep
        });

        for (name, spec) in specs {
            let Some(slot) = self.dispatchers.get_mut(name) else {
                let dispatcher = build_dispatcher(factory, name, spec);
                self.dispatchers.insert(
                    name.clone(),
                    DispatcherSlot {
                        spec: spec.clone(),
                        dispatcher,
                    },
                );
                continue;
            };

            let reusable = slot.dispatcher.is_some() && slot.spec.same_init(spec);
            if reusable {
                if let Some(dispatcher) = slot.dispatcher.as_mut() {
                    dispatcher.set(spec);
                }
            } else {
                if let Some(old) = slot.dispatcher.take() {
                    info!(
                        dispatcher = %name,
                        dropped = old.buffered(),
                        "Dispatcher init settings changed, rebuilding"
                    );
                }
                slot.dispatcher = build_dispatcher(factory, name, spec);
            }
            slot.spec = spec.clone();
        }
    }

    /// Run every listener once and fan decoded readings out to the dispatchers
    ///
    /// Returns the number of readings received.
    pub fn poll_listeners(&mut self, now: Instant) -> usize {
        let mut received = 0;
        let listeners = self
            .listeners
            .values_mut()
            .filter_map(|slot| slot.listener.as_mut());
        for listener in listeners {
            listener.run(now);
            let Some(reading) = listener.read() else {
                continue;
            };
            received += 1;
            for dispatcher in self
                .dispatchers
                .values_mut()
                .filter_map(|slot| slot.dispatcher.as_mut())
            {
                dispatcher.add(reading.clone());
            }
        }
        received
    }

    /// Flush every dispatcher that is due
    ///
    /// Returns the number of requests made.
    pub async fn flush_due(&mut self, now: Instant) -> usize {
        let mut requests = 0;
        let dispatchers = self
            .dispatchers
            .values_mut()
            .filter_map(|slot| slot.dispatcher.as_mut());
        for dispatcher in dispatchers {
            if !dispatcher.should_flush(now) {
                continue;
            }
            if dispatcher.flush(now).await != FlushOutcome::Idle {
                requests += 1;
            }
        }
        requests
    }

    /// Close every listener
    pub fn close_all(&mut self) {
        for listener in self
            .listeners
            .values_mut()
            .filter_map(|slot| slot.listener.as_mut())
        {
            listener.close();
        }
    }

    /// Live listener by name
    pub fn listener(&self, name: &str) -> Option<&dyn Listener> {
        self.listeners
            .get(name)
            .and_then(|slot| slot.listener.as_deref())
    }

    /// Live dispatcher by name
    pub fn dispatcher(&self, name: &str) -> Option<&Dispatcher<U>> {
        self.dispatchers
            .get(name)
            .and_then(|slot| slot.dispatcher.as_ref())
    }

    /// Number of listeners holding a transport
    pub fn open_listeners(&self) -> usize {
        self.listeners
            .values()
            .filter(|slot| slot.listener.as_ref().is_some_and(|l| l.is_open()))
            .count()
    }

    /// Number of live dispatchers
    pub fn live_dispatchers(&self) -> usize {
        self.dispatchers
            .values()
            .filter(|slot| slot.dispatcher.is_some())
            .count()
    }

    /// Counter snapshot per dispatcher
    pub fn stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.dispatchers
            .iter()
            .filter_map(|(name, slot)| {
                slot.dispatcher
                    .as_ref()
                    .map(|dispatcher| (name.clone(), dispatcher.stats()))
            })
            .collect()
    }
}

fn build_listener<F: ComponentFactory>(
    factory: &mut F,
    name: &str,
    spec: &ListenerSpec,
    now: Instant,
) -> Option<Box<dyn Listener>> {
    match factory.open_listener(name, spec, now) {
        Ok(listener) => {
            info!(listener = name, listener_type = spec.kind(), "Listener ready");
            Some(listener)
        }
        Err(e) => {
            error!(listener = name, error = %e, "Listener init failed, retrying on next settings change");
            None
        }
    }
}

fn build_dispatcher<F: ComponentFactory>(
    factory: &mut F,
    name: &str,
    spec: &BufferSpec,
) -> Option<Dispatcher<F::Uplink>> {
    match factory.open_dispatcher(name, spec) {
        Ok(dispatcher) => {
            info!(
                dispatcher = name,
                buffer_type = spec.kind(),
                active = dispatcher.is_active(),
                "Dispatcher ready"
            );
            Some(dispatcher)
        }
        Err(e) => {
            error!(dispatcher = name, error = %e, "Dispatcher init failed, retrying on next settings change");
            None
        }
    }
}

//! Gateway engine - the cooperative main loop
//!
//! One cycle:
//! 1. poll the settings source, reconcile components on change
//! 2. run every listener and fan its reading out to the dispatchers
//! 3. flush every dispatcher that is due
//!
//! Cycles repeat every tick until the exit flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use contracts::SettingsSource;
use observability::LogLevelHandle;
use tracing::{debug, info, warn};

use crate::factory::ComponentFactory;
use crate::registry::Registry;

/// Pause between two cycles
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// What one cycle did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Settings snapshot changed and was applied
    pub settings_changed: bool,
    /// Readings received across all listeners
    pub readings: usize,
    /// Requests made by dispatchers
    pub requests: usize,
}

/// Settings source + factory + live components
pub struct Gateway<S, F: ComponentFactory> {
    source: S,
    factory: F,
    registry: Registry<F::Uplink>,
    log_level: Option<LogLevelHandle>,
    tick: Duration,
}

impl<S: SettingsSource, F: ComponentFactory> Gateway<S, F> {
    /// Create a gateway; components are built from the first settings snapshot
    pub fn new(source: S, factory: F) -> Self {
        Self {
            source,
            factory,
            registry: Registry::new(),
            log_level: None,
            tick: DEFAULT_TICK,
        }
    }

    /// Override the pause between cycles
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Let `gateway.loglevel` drive the log filter
    pub fn with_log_level(mut self, handle: LogLevelHandle) -> Self {
        self.log_level = Some(handle);
        self
    }

    /// Live components
    pub fn registry(&self) -> &Registry<F::Uplink> {
        &self.registry
    }

    /// Component factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Settings source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Run one cycle
    pub async fn cycle(&mut self, now: Instant) -> CycleReport {
        let settings_changed = self.source.check_settings().await;
        if settings_changed {
            self.apply_settings(now);
        }

        let readings = self.registry.poll_listeners(now);
        let requests = self.registry.flush_due(now).await;

        CycleReport {
            settings_changed,
            readings,
            requests,
        }
    }

    fn apply_settings(&mut self, now: Instant) {
        let settings = self.source.settings();
        info!(
            source = self.source.name(),
            listeners = settings.listeners.len(),
            buffers = settings.buffers.len(),
            "Applying settings"
        );

        if let Some(handle) = &self.log_level {
            match handle.set_level(&settings.gateway.log_level) {
                Ok(true) => info!(level = %settings.gateway.log_level, "Log level changed"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Couldn't apply log level"),
            }
        }

        self.registry.reconcile(settings, &mut self.factory, now);
        debug!(
            open_listeners = self.registry.open_listeners(),
            dispatchers = self.registry.live_dispatchers(),
            "Settings applied"
        );
    }

    /// Cycle until `exit` is raised, then shut down
    ///
    /// The flag is checked between cycles; a send in progress completes or
    /// times out first.
    pub async fn run(&mut self, exit: &AtomicBool) {
        info!(tick_ms = self.tick.as_millis() as u64, "Gateway started");

        while !exit.load(Ordering::Relaxed) {
            self.cycle(Instant::now()).await;
            tokio::time::sleep(self.tick).await;
        }

        info!("Exit requested");
        self.shutdown();
    }

    /// Close every listener and log a per-dispatcher summary
    pub fn shutdown(&mut self) {
        self.registry.close_all();

        for (name, stats) in self.registry.stats() {
            info!(
                dispatcher = %name,
                sent = stats.sent,
                requests = stats.send_count,
                failed = stats.failure_count,
                evicted = stats.evicted,
                pending = stats.queue_len,
                "Dispatcher summary"
            );
        }
        info!("Gateway stopped");
    }
}

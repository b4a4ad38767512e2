//! Dispatcher - buffers readings for one destination and flushes them
//!
//! Flush cycle: `Idle -> (flush due) -> Sending -> {ok: drop the batch;
//! failure: keep the batch} -> Idle`. Failures never leave the dispatcher;
//! the batch is retried on the next flush opportunity.

use std::time::{Duration, Instant};

use contracts::{BufferSpec, FlushSettings, Reading, TimestampedReading, Uplink};
use observability::{
    record_buffer_depth, record_reading_buffered, record_readings_evicted, record_send_result,
};
use tracing::{debug, info, instrument, warn};

use crate::buffer::{BoundedBuffer, MAX_BUFFERED};
use crate::error::DispatcherError;
use crate::metrics::{DispatcherStats, StatsSnapshot};
use crate::uplinks::AnyUplink;

/// Result of one flush opportunity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing buffered, no request made
    Idle,
    /// Destination accepted this many readings
    Sent(usize),
    /// Request failed, buffer unchanged
    Failed(contracts::SendError),
}

/// Buffer + uplink for one destination
#[derive(Debug)]
pub struct Dispatcher<U> {
    name: String,
    uplink: U,
    buffer: BoundedBuffer,
    settings: FlushSettings,
    last_send: Option<Instant>,
    stats: DispatcherStats,
}

/// Build a dispatcher for the buffer spec
#[instrument(name = "dispatcher_open", skip(spec), fields(buffer_type = spec.kind()))]
pub fn open_dispatcher(name: &str, spec: &BufferSpec) -> Result<Dispatcher<AnyUplink>, DispatcherError> {
    let uplink = AnyUplink::from_spec(name, spec)?;
    Ok(Dispatcher::new(name, uplink, spec.flush_settings()))
}

/// Wall-clock seconds since the UNIX epoch
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

impl<U: Uplink> Dispatcher<U> {
    /// Create a dispatcher with the default buffer capacity
    pub fn new(name: impl Into<String>, uplink: U, settings: FlushSettings) -> Self {
        Self::with_capacity(name, uplink, settings, MAX_BUFFERED)
    }

    /// Create a dispatcher with a custom buffer capacity
    pub fn with_capacity(
        name: impl Into<String>,
        uplink: U,
        settings: FlushSettings,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            uplink,
            buffer: BoundedBuffer::new(capacity),
            settings,
            last_send: None,
            stats: DispatcherStats::new(),
        }
    }

    /// Dispatcher name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current flush settings
    pub fn settings(&self) -> &FlushSettings {
        &self.settings
    }

    /// Whether readings are accepted and flushed
    pub fn is_active(&self) -> bool {
        self.settings.active
    }

    /// Buffered readings
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Oldest buffered reading
    pub fn peek_oldest(&self) -> Option<&TimestampedReading> {
        self.buffer.peek_oldest()
    }

    /// The uplink
    pub fn uplink(&self) -> &U {
        &self.uplink
    }

    /// Counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.buffer.len(), self.buffer.evicted())
    }

    /// Apply new runtime settings
    pub fn set(&mut self, spec: &BufferSpec) {
        let settings = spec.flush_settings();
        if settings.active != self.settings.active {
            info!(
                dispatcher = %self.name,
                active = settings.active,
                "Dispatcher activation changed"
            );
        }
        if settings != self.settings {
            debug!(dispatcher = %self.name, settings = ?settings, "Flush settings updated");
            self.settings = settings;
        }
        if let BufferSpec::Emoncms {
            runtime_settings, ..
        } = spec
        {
            self.uplink.set_destination(runtime_settings);
        }
    }

    /// Stamp and buffer a reading
    ///
    /// Inactive dispatchers ignore readings; returns whether it was buffered.
    pub fn add(&mut self, reading: Reading) -> bool {
        self.add_at(reading, unix_now())
    }

    /// Buffer a reading with an explicit timestamp
    pub fn add_at(&mut self, reading: Reading, timestamp: f64) -> bool {
        if !self.settings.active {
            return false;
        }

        let node = reading.node_id;
        if let Some(evicted) = self.buffer.push(TimestampedReading::new(timestamp, reading)) {
            debug!(
                dispatcher = %self.name,
                node = evicted.reading.node_id,
                "Buffer full, oldest reading evicted"
            );
            record_readings_evicted(&self.name, 1);
        }
        self.stats.inc_buffered();
        record_reading_buffered(&self.name);
        record_buffer_depth(&self.name, self.buffer.len());
        debug!(dispatcher = %self.name, node, buffered = self.buffer.len(), "Reading buffered");
        true
    }

    /// Whether a flush is due at `now`
    pub fn should_flush(&self, now: Instant) -> bool {
        if !self.settings.active {
            return false;
        }
        match self.last_send {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.flush_period(),
        }
    }

    /// Send the oldest batch
    ///
    /// Success removes exactly the sent readings; failure leaves the buffer
    /// as it was. The send time is recorded either way.
    pub async fn flush(&mut self, now: Instant) -> FlushOutcome {
        if self.buffer.is_empty() {
            return FlushOutcome::Idle;
        }

        let batch = self.buffer.oldest(self.settings.batch_size.max(1));
        let result = self.uplink.send(&batch, unix_now()).await;
        self.last_send = Some(now);

        match result {
            Ok(()) => {
                let sent = self.buffer.discard_oldest(batch.len());
                self.stats.record_success(sent);
                record_send_result(&self.name, None, sent);
                record_buffer_depth(&self.name, self.buffer.len());
                debug!(
                    dispatcher = %self.name,
                    sent,
                    remaining = self.buffer.len(),
                    "Batch delivered"
                );
                FlushOutcome::Sent(sent)
            }
            Err(e) => {
                self.stats.inc_failure_count();
                record_send_result(&self.name, Some(e.kind()), batch.len());
                warn!(
                    dispatcher = %self.name,
                    kind = e.kind(),
                    error = %e,
                    buffered = self.buffer.len(),
                    "Send failed, batch kept for retry"
                );
                FlushOutcome::Failed(e)
            }
        }
    }

    fn flush_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.settings.flush_period).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DestinationConfig, SendError};
    use std::collections::VecDeque;

    /// Uplink replaying scripted results and recording every batch
    #[derive(Debug, Default)]
    struct MockUplink {
        script: VecDeque<Result<(), SendError>>,
        batches: Vec<Vec<i64>>,
        destination: Option<DestinationConfig>,
    }

    impl MockUplink {
        fn scripted(results: Vec<Result<(), SendError>>) -> Self {
            Self {
                script: results.into(),
                ..Self::default()
            }
        }

        fn delivered(&self) -> Vec<i64> {
            self.batches.iter().flatten().copied().collect()
        }
    }

    impl Uplink for MockUplink {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&mut self, batch: &[TimestampedReading], _now: f64) -> Result<(), SendError> {
            let result = self.script.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                self.batches
                    .push(batch.iter().map(|item| item.reading.node_id).collect());
            }
            result
        }

        fn set_destination(&mut self, destination: &DestinationConfig) {
            self.destination = Some(destination.clone());
        }
    }

    fn settings(flush_period: f64, batch_size: usize) -> FlushSettings {
        FlushSettings {
            flush_period,
            active: true,
            batch_size,
        }
    }

    fn reading(node: i64) -> Reading {
        Reading::new(node, vec![node * 10])
    }

    fn down() -> Result<(), SendError> {
        Err(SendError::transport("connection refused"))
    }

    #[tokio::test]
    async fn test_delivered_in_order_after_outage() {
        let uplink = MockUplink::scripted(vec![down(), down()]);
        let mut dispatcher = Dispatcher::new("local", uplink, settings(0.0, 1));
        for node in 1..=3 {
            assert!(dispatcher.add(reading(node)));
        }

        let now = Instant::now();
        assert!(matches!(dispatcher.flush(now).await, FlushOutcome::Failed(_)));
        assert!(matches!(dispatcher.flush(now).await, FlushOutcome::Failed(_)));
        assert_eq!(dispatcher.buffered(), 3);

        for _ in 0..3 {
            assert!(dispatcher.should_flush(now));
            assert_eq!(dispatcher.flush(now).await, FlushOutcome::Sent(1));
        }
        assert_eq!(dispatcher.flush(now).await, FlushOutcome::Idle);

        assert_eq!(dispatcher.uplink().delivered(), vec![1, 2, 3]);
        let stats = dispatcher.stats();
        assert_eq!(stats.sent, 3);
        assert_eq!(stats.failure_count, 2);
        assert_eq!(stats.queue_len, 0);
    }

    #[tokio::test]
    async fn test_batch_delivered_on_third_cycle_after_outage() {
        let uplink = MockUplink::scripted(vec![down(), down()]);
        let mut dispatcher = Dispatcher::new("local", uplink, settings(0.0, 3));
        for node in 1..=3 {
            assert!(dispatcher.add(reading(node)));
        }

        let now = Instant::now();
        assert!(matches!(dispatcher.flush(now).await, FlushOutcome::Failed(_)));
        assert!(matches!(dispatcher.flush(now).await, FlushOutcome::Failed(_)));
        assert_eq!(dispatcher.flush(now).await, FlushOutcome::Sent(3));

        assert_eq!(dispatcher.uplink().batches, vec![vec![1, 2, 3]]);
        assert_eq!(dispatcher.buffered(), 0);
        assert_eq!(dispatcher.stats().failure_count, 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_buffer_identical() {
        let uplink = MockUplink::scripted(vec![Err(SendError::Http { status: 503 })]);
        let mut dispatcher = Dispatcher::new("local", uplink, settings(0.0, 2));
        for node in 1..=3 {
            dispatcher.add_at(reading(node), node as f64);
        }
        let before: Vec<_> = dispatcher.buffer.oldest(10);

        let outcome = dispatcher.flush(Instant::now()).await;
        assert_eq!(outcome, FlushOutcome::Failed(SendError::Http { status: 503 }));
        assert_eq!(dispatcher.buffer.oldest(10), before);
    }

    #[tokio::test]
    async fn test_batch_size_limits_request() {
        let mut dispatcher = Dispatcher::new("local", MockUplink::default(), settings(0.0, 2));
        for node in 1..=5 {
            dispatcher.add(reading(node));
        }

        let now = Instant::now();
        assert_eq!(dispatcher.flush(now).await, FlushOutcome::Sent(2));
        assert_eq!(dispatcher.flush(now).await, FlushOutcome::Sent(2));
        assert_eq!(dispatcher.flush(now).await, FlushOutcome::Sent(1));
        assert_eq!(dispatcher.uplink().batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[tokio::test]
    async fn test_should_flush_respects_period() {
        let mut dispatcher = Dispatcher::new("remote", MockUplink::default(), settings(30.0, 1));
        let t0 = Instant::now();
        assert!(dispatcher.should_flush(t0));

        dispatcher.add(reading(1));
        dispatcher.flush(t0).await;
        assert!(!dispatcher.should_flush(t0 + Duration::from_secs(29)));
        assert!(dispatcher.should_flush(t0 + Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_failed_send_also_waits_for_period() {
        let uplink = MockUplink::scripted(vec![down()]);
        let mut dispatcher = Dispatcher::new("remote", uplink, settings(30.0, 1));
        dispatcher.add(reading(1));

        let t0 = Instant::now();
        dispatcher.flush(t0).await;
        assert!(!dispatcher.should_flush(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_inactive_dispatcher_ignores_readings() {
        let mut dispatcher = Dispatcher::new(
            "remote",
            MockUplink::default(),
            FlushSettings {
                active: false,
                ..FlushSettings::default()
            },
        );
        assert!(!dispatcher.add(reading(1)));
        assert_eq!(dispatcher.buffered(), 0);
        assert!(!dispatcher.should_flush(Instant::now()));
    }

    #[test]
    fn test_capacity_eviction() {
        let mut dispatcher =
            Dispatcher::with_capacity("local", MockUplink::default(), settings(0.0, 1), 2);
        for node in 1..=3 {
            dispatcher.add(reading(node));
        }
        assert_eq!(dispatcher.buffered(), 2);
        assert_eq!(dispatcher.peek_oldest().map(|i| i.reading.node_id), Some(2));
        assert_eq!(dispatcher.stats().evicted, 1);
    }

    #[test]
    fn test_set_updates_settings_and_destination() {
        let mut dispatcher = Dispatcher::new("local", MockUplink::default(), settings(0.0, 1));
        let destination = DestinationConfig {
            protocol: "https://".into(),
            host: "emoncms.org".into(),
            path: String::new(),
            api_key: "key".into(),
            flush_period: 30.0,
            active: false,
            batch_size: 10,
        };
        dispatcher.set(&BufferSpec::Emoncms {
            init_settings: Default::default(),
            runtime_settings: destination.clone(),
        });

        assert_eq!(dispatcher.settings(), &destination.flush_settings());
        assert!(!dispatcher.is_active());
        assert_eq!(dispatcher.uplink().destination, Some(destination));
    }

    #[test]
    fn test_open_dispatcher_from_spec() {
        let spec = BufferSpec::Log {
            runtime_settings: settings(5.0, 1),
        };
        let dispatcher = open_dispatcher("debug", &spec).unwrap();
        assert_eq!(dispatcher.name(), "debug");
        assert_eq!(dispatcher.settings().flush_period, 5.0);
    }
}

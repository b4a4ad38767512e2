//! Dispatcher statistics

/// Counters kept by one dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Readings accepted into the buffer
    buffered: u64,
    /// Readings confirmed by the destination
    sent: u64,
    /// Successful requests
    send_count: u64,
    /// Failed requests
    failure_count: u64,
}

impl DispatcherStats {
    /// Create new stats instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a buffered reading
    pub fn inc_buffered(&mut self) {
        self.buffered += 1;
    }

    /// Count a successful request carrying `items` readings
    pub fn record_success(&mut self, items: usize) {
        self.send_count += 1;
        self.sent += items as u64;
    }

    /// Count a failed request
    pub fn inc_failure_count(&mut self) {
        self.failure_count += 1;
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self, queue_len: usize, evicted: u64) -> StatsSnapshot {
        StatsSnapshot {
            queue_len,
            buffered: self.buffered,
            sent: self.sent,
            send_count: self.send_count,
            failure_count: self.failure_count,
            evicted,
        }
    }
}

/// Snapshot of dispatcher counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub queue_len: usize,
    pub buffered: u64,
    pub sent: u64,
    pub send_count: u64,
    pub failure_count: u64,
    pub evicted: u64,
}

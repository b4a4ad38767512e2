//! Bounded FIFO of timestamped readings
//!
//! Design:
//! - HeapRb holds the readings in arrival order
//! - Inserting into a full buffer evicts the oldest reading
//! - Every operation is O(1) except copying a batch out (O(batch))

use std::fmt;

use contracts::TimestampedReading;
use ringbuf::{traits::*, HeapRb};

/// Readings a dispatcher keeps before evicting the oldest
pub const MAX_BUFFERED: usize = 1000;

/// Bounded FIFO buffer
pub struct BoundedBuffer {
    items: HeapRb<TimestampedReading>,
    evicted: u64,
}

impl fmt::Debug for BoundedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("len", &self.items.occupied_len())
            .field("capacity", &self.capacity())
            .field("evicted", &self.evicted)
            .finish()
    }
}

impl Default for BoundedBuffer {
    fn default() -> Self {
        Self::new(MAX_BUFFERED)
    }
}

impl BoundedBuffer {
    /// Create a buffer holding at most `capacity` readings (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            items: HeapRb::new(capacity.max(1)),
            evicted: 0,
        }
    }

    /// Append a reading, returning the evicted oldest one when full
    pub fn push(&mut self, item: TimestampedReading) -> Option<TimestampedReading> {
        let evicted = self.items.push_overwrite(item);
        if evicted.is_some() {
            self.evicted += 1;
        }
        evicted
    }

    /// Oldest reading, if any
    pub fn peek_oldest(&self) -> Option<&TimestampedReading> {
        self.items.try_peek()
    }

    /// Remove and return the oldest reading
    pub fn pop_oldest(&mut self) -> Option<TimestampedReading> {
        self.items.try_pop()
    }

    /// Copy out the `n` oldest readings without removing them
    pub fn oldest(&self, n: usize) -> Vec<TimestampedReading> {
        self.items.iter().take(n).cloned().collect()
    }

    /// Remove up to `n` oldest readings, returning how many were removed
    pub fn discard_oldest(&mut self, n: usize) -> usize {
        self.items.skip(n.min(self.items.occupied_len()))
    }

    /// Number of buffered readings
    pub fn len(&self) -> usize {
        self.items.occupied_len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of readings held
    pub fn capacity(&self) -> usize {
        self.items.capacity().get()
    }

    /// Readings evicted since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

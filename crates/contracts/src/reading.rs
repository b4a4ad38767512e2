//! Reading - decoded sensor sample
//!
//! `Reading` is what a listener produces; `TimestampedReading` is what a
//! dispatcher buffers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One decoded frame: the emitting node and its values in wire order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reading {
    /// Node identifier (first token of the frame)
    pub node_id: i64,

    /// Decoded values, in the order they appeared on the wire
    pub values: Vec<i64>,
}

impl Reading {
    /// Create a reading
    pub fn new(node_id: i64, values: Vec<i64>) -> Self {
        Self { node_id, values }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}: {:?}", self.node_id, self.values)
    }
}

/// A reading stamped with the time it entered a dispatcher buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedReading {
    /// Seconds since the UNIX epoch, rounded to 10 ms
    pub timestamp: f64,

    /// The buffered reading
    pub reading: Reading,
}

impl TimestampedReading {
    /// Stamp a reading
    pub fn new(timestamp: f64, reading: Reading) -> Self {
        Self {
            timestamp: (timestamp * 100.0).round() / 100.0,
            reading,
        }
    }

    /// Whole seconds between this reading and `now` (negative for past samples)
    pub fn offset_from(&self, now: f64) -> i64 {
        (self.timestamp - now).round() as i64
    }
}

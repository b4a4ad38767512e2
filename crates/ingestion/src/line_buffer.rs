//! Partial-line accumulation for byte streams

use tracing::warn;

/// Upper bound on buffered bytes
///
/// Past it the oldest complete lines are dropped; a stream that never sends a
/// terminator is discarded outright.
pub const MAX_PENDING_BYTES: usize = 4096;

const TERMINATOR: &[u8] = b"\r\n";

/// Accumulates raw bytes and hands out complete `\r\n`-terminated lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes, keeping at most [`MAX_PENDING_BYTES`]
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() <= MAX_PENDING_BYTES {
            return;
        }

        let mut dropped_lines = 0usize;
        while self.pending.len() > MAX_PENDING_BYTES {
            let Some(end) = self.terminator_at() else {
                warn!(
                    discarded = self.pending.len(),
                    "No line terminator within limit, discarding pending bytes"
                );
                self.pending.clear();
                break;
            };
            self.pending.drain(..end + TERMINATOR.len());
            dropped_lines += 1;
        }

        if dropped_lines > 0 {
            warn!(
                dropped_lines,
                pending = self.pending.len(),
                "Lines arriving faster than they are read, dropped the oldest"
            );
        }
    }

    /// Remove and return the oldest complete line, terminator stripped
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.terminator_at()?;
        let line = String::from_utf8_lossy(&self.pending[..end]).into_owned();
        self.pending.drain(..end + TERMINATOR.len());
        Some(line)
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn terminator_at(&self) -> Option<usize> {
        self.pending
            .windows(TERMINATOR.len())
            .position(|window| window == TERMINATOR)
    }
}

//! In-memory radio link
//!
//! Stands in for the serial port in tests and local experiments. Clones share
//! state, so a test can keep one handle while the listener owns another.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct LinkState {
    inbound: VecDeque<u8>,
    written: Vec<String>,
}

/// Shared in-memory byte link
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    state: Arc<Mutex<LinkState>>,
}

impl MemoryLink {
    /// Create an empty link
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the listener to read
    pub fn feed(&self, bytes: &[u8]) {
        if let Ok(mut state) = self.state.lock() {
            state.inbound.extend(bytes);
        }
    }

    /// Every write the listener made, in order
    pub fn written(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.written.clone())
            .unwrap_or_default()
    }
}

impl Read for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("memory link poisoned"))?;
        if state.inbound.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("memory link poisoned"))?;
        state.written.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

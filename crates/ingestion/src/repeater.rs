//! Radio repeater
//!
//! TCP peers hand frames to the radio bridge: every `\r\n`-terminated line
//! received on the repeater port is written to the radio link as is.

use std::io;
use std::net::SocketAddr;

use tracing::{debug, warn};

use crate::line_buffer::LineBuffer;
use crate::tcp::OneShotServer;

/// Accepts frames destined for the radio
#[derive(Debug)]
pub struct Repeater {
    server: OneShotServer,
    rx: LineBuffer,
}

impl Repeater {
    /// Listen on `port` on all interfaces
    pub fn bind(port: u16) -> io::Result<Self> {
        Self::bind_on("0.0.0.0", port)
    }

    /// Listen on a specific address
    pub fn bind_on(address: &str, port: u16) -> io::Result<Self> {
        Ok(Self {
            server: OneShotServer::bind(address, port)?,
            rx: LineBuffer::new(),
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Serve one pending connection and return the complete frames received
    pub fn poll(&mut self) -> Vec<String> {
        match self.server.poll() {
            Ok(Some(chunk)) => self.rx.extend(&chunk),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Repeater connection failed"),
        }

        let mut frames = Vec::new();
        while let Some(line) = self.rx.next_line() {
            if line.trim().is_empty() {
                continue;
            }
            debug!(frame = %line, "Repeater frame received");
            frames.push(line);
        }
        frames
    }
}

//! Socket listener
//!
//! Peers connect to the configured TCP port and write frames shaped
//! `node value [value ...]\r\n`.

use std::net::SocketAddr;
use std::time::Instant;

use contracts::{ListenerSpec, Reading, SocketInit};
use tracing::{debug, info, warn};

use crate::decoder::FrameShape;
use crate::error::{ListenerError, Result};
use crate::line_buffer::LineBuffer;
use crate::listener::{decode_line, kind_mismatch, Listener};
use crate::tcp::OneShotServer;

/// Listener fed by one-shot TCP connections
#[derive(Debug)]
pub struct SocketListener {
    name: String,
    server: Option<OneShotServer>,
    rx: LineBuffer,
}

impl SocketListener {
    /// Bind the listen socket
    pub fn open(name: &str, init: &SocketInit) -> Result<Self> {
        let server = OneShotServer::bind(&init.bind_address, init.port).map_err(|e| {
            ListenerError::init(name, format!("{}:{}", init.bind_address, init.port), e)
        })?;
        info!(
            listener = name,
            address = %server.local_addr(),
            "Socket listener opened"
        );

        Ok(Self {
            name: name.to_string(),
            server: Some(server),
            rx: LineBuffer::new(),
        })
    }

    /// Bound address, while open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(OneShotServer::local_addr)
    }
}

impl Listener for SocketListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "socket"
    }

    fn is_open(&self) -> bool {
        self.server.is_some()
    }

    fn read(&mut self) -> Option<Reading> {
        let server = self.server.as_ref()?;
        match server.poll() {
            Ok(Some(chunk)) => {
                debug!(listener = %self.name, bytes = chunk.len(), "Socket chunk received");
                self.rx.extend(&chunk);
            }
            Ok(None) => {}
            Err(e) => warn!(listener = %self.name, error = %e, "Socket connection failed"),
        }

        let line = self.rx.next_line()?;
        decode_line(&self.name, &line, FrameShape::PlainValues)
    }

    fn set(&mut self, spec: &ListenerSpec, _now: Instant) -> Result<()> {
        match spec {
            // no runtime parameters
            ListenerSpec::Socket { .. } => Ok(()),
            other => Err(kind_mismatch(self, other)),
        }
    }

    fn close(&mut self) {
        if self.server.take().is_some() {
            debug!(listener = %self.name, "Socket listener closed");
        }
        self.rx.clear();
    }
}

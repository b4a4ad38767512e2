//! One-shot TCP server
//!
//! Peers connect, write a few `\r\n`-terminated frames and leave. Each poll
//! accepts at most one pending connection, reads a single chunk from it and
//! closes it. Polling never blocks on `accept`.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use tracing::trace;

/// Bytes read from one connection
pub const CHUNK_SIZE: usize = 1024;

/// Upper bound on waiting for an accepted peer to send its chunk
pub const CONNECTION_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Non-blocking listen socket serving one chunk per connection
#[derive(Debug)]
pub struct OneShotServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl OneShotServer {
    /// Bind and switch the listen socket to non-blocking mode
    pub fn bind(address: &str, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((address, port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve one pending connection, if any
    ///
    /// Returns `Ok(None)` when nobody is waiting. A peer that connects but
    /// sends nothing yields an empty chunk.
    pub fn poll(&self) -> io::Result<Option<Vec<u8>>> {
        let (mut stream, peer) = match self.listener.accept() {
            Ok(connection) => connection,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e),
        };

        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(CONNECTION_READ_TIMEOUT))?;

        let mut chunk = vec![0u8; CHUNK_SIZE];
        let read = match stream.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => 0,
            Err(e) => return Err(e),
        };
        chunk.truncate(read);

        trace!(%peer, bytes = read, "Connection served");
        Ok(Some(chunk))
    }
}

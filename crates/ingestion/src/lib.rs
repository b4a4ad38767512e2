//! # Ingestion
//!
//! Local data sources for the gateway.
//!
//! Responsibilities:
//! - Decode `\r\n`-terminated frames into `Reading`s
//! - Radio listener on a serial bridge (configuration writes, time broadcast, repeater)
//! - Socket listener fed by one-shot TCP connections
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::open_listener;
//!
//! let mut listener = open_listener("rfm2pi", &spec, Instant::now())?;
//! loop {
//!     if let Some(reading) = listener.read() {
//!         // fan out to dispatchers
//!     }
//!     listener.run(Instant::now());
//! }
//! ```
//!
//! ## Testing
//!
//! ```ignore
//! use ingestion::{MemoryLink, RadioListener};
//!
//! let link = MemoryLink::new();
//! let mut radio = RadioListener::with_link("rfm2pi", link.clone());
//! link.feed(b"10 69 6 144 0\r\n");
//! ```

mod decoder;
mod error;
mod line_buffer;
mod listener;
mod memory_link;
mod radio;
mod repeater;
mod socket;
mod tcp;

// Re-exports
pub use decoder::{decode, Frame, FrameShape};
pub use error::{DecodeError, ListenerError, Result};
pub use line_buffer::{LineBuffer, MAX_PENDING_BYTES};
pub use listener::{open_listener, Listener};
pub use memory_link::MemoryLink;
pub use radio::{time_command, AppliedRadio, RadioListener, MAX_PENDING_WRITES, RADIO_SETTLE_TIME};
pub use repeater::Repeater;
pub use socket::SocketListener;
pub use tcp::{OneShotServer, CHUNK_SIZE, CONNECTION_READ_TIMEOUT};

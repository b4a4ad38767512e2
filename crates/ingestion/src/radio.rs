//! Radio listener
//!
//! Reads packed-byte frames from an RFM2Pi style serial bridge and drives
//! its configuration:
//!
//! - `<n>i` sets the base node id
//! - `<n>b` sets the frequency band
//! - `<n>g` sets the network group
//! - `HH,00,MM,00,s` broadcasts the wall-clock time
//!
//! The bridge needs a pause between configuration writes. Instead of
//! sleeping, writes are queued and released one per settle interval from
//! `set()` and `run()`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{Local, Timelike};
use contracts::{ListenerSpec, RadioInit, RadioRuntime, Reading};
use serialport::SerialPort;
use tracing::{debug, info, warn};

use crate::decoder::FrameShape;
use crate::error::{ListenerError, Result};
use crate::line_buffer::LineBuffer;
use crate::listener::{decode_line, kind_mismatch, Listener};
use crate::repeater::Repeater;

/// Minimum spacing between two configuration writes
pub const RADIO_SETTLE_TIME: Duration = Duration::from_secs(1);

/// Writes queued for the bridge; repeater frames beyond this are dropped
pub const MAX_PENDING_WRITES: usize = 32;

const READ_CHUNK: usize = 256;

/// Radio parameters last sent to the bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedRadio {
    pub baseid: Option<u8>,
    pub frequency: Option<u8>,
    pub group: Option<u8>,
}

/// Listener on a serial radio bridge
///
/// Generic over the link so tests can substitute an in-memory one.
pub struct RadioListener<P = Box<dyn SerialPort>> {
    name: String,
    link: Option<P>,
    rx: LineBuffer,
    applied: AppliedRadio,
    send_time_interval: u64,
    last_time_broadcast: Option<Instant>,
    pending: VecDeque<String>,
    last_write: Option<Instant>,
    settle: Duration,
    repeater: Option<Repeater>,
}

impl RadioListener {
    /// Open the serial port (non-blocking reads) and the optional repeater
    pub fn open(name: &str, init: &RadioInit) -> Result<Self> {
        debug!(listener = name, port = %init.port, baud_rate = init.baud_rate, "Opening serial port");
        let link = serialport::new(&init.port, init.baud_rate)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|e| ListenerError::init(name, &init.port, e))?;

        let mut listener = Self::with_link(name, link);
        if let Some(port) = init.repeater_port {
            let repeater = Repeater::bind(port)
                .map_err(|e| ListenerError::init(name, format!("repeater port {port}"), e))?;
            listener = listener.with_repeater(repeater);
        }

        info!(listener = name, port = %init.port, "Radio listener opened");
        Ok(listener)
    }
}

impl<P: Read + Write + Send> RadioListener<P> {
    /// Wrap an already open link
    pub fn with_link(name: impl Into<String>, link: P) -> Self {
        Self {
            name: name.into(),
            link: Some(link),
            rx: LineBuffer::new(),
            applied: AppliedRadio::default(),
            send_time_interval: 0,
            last_time_broadcast: None,
            pending: VecDeque::new(),
            last_write: None,
            settle: RADIO_SETTLE_TIME,
            repeater: None,
        }
    }

    /// Override the spacing between configuration writes
    pub fn with_settle_time(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Attach a repeater
    pub fn with_repeater(mut self, repeater: Repeater) -> Self {
        self.repeater = Some(repeater);
        self
    }

    /// Repeater address, if one is attached
    pub fn repeater_addr(&self) -> Option<SocketAddr> {
        self.repeater.as_ref().map(Repeater::local_addr)
    }

    /// Parameters as last queued for the bridge
    pub fn applied(&self) -> AppliedRadio {
        self.applied
    }

    /// Writes still waiting for their settle slot
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Apply radio runtime settings
    ///
    /// A parameter is queued only when it differs from the last applied
    /// value; absent parameters are left alone.
    pub fn apply(&mut self, settings: &RadioRuntime, now: Instant) {
        let changes = [
            ("baseid", &mut self.applied.baseid, settings.baseid, 'i'),
            ("frequency", &mut self.applied.frequency, settings.frequency, 'b'),
            ("group", &mut self.applied.group, settings.group, 'g'),
        ];
        for (parameter, applied, value, suffix) in changes {
            let Some(value) = value else { continue };
            if *applied == Some(value) {
                continue;
            }
            *applied = Some(value);
            info!(listener = %self.name, parameter, value, "Setting radio parameter");
            self.pending.push_back(format!("{value}{suffix}"));
        }

        if settings.send_time_interval != self.send_time_interval {
            self.send_time_interval = settings.send_time_interval;
            debug!(
                listener = %self.name,
                interval = self.send_time_interval,
                "Time broadcast interval changed"
            );
        }

        self.drain_pending(now);
    }

    fn settled(&self, now: Instant) -> bool {
        self.last_write
            .is_none_or(|last| now.saturating_duration_since(last) >= self.settle)
    }

    fn drain_pending(&mut self, now: Instant) {
        while self.settled(now) {
            let Some(command) = self.pending.front().cloned() else {
                break;
            };
            let result = self.write(&command);
            self.last_write = Some(now);
            if let Err(e) = result {
                // kept at the front and retried from the next run()
                warn!(listener = %self.name, command = %command, error = %e, "Radio write failed");
                break;
            }
            self.pending.pop_front();
        }
    }

    fn broadcast_time_if_due(&mut self, now: Instant) {
        if self.send_time_interval == 0 {
            return;
        }
        let interval = Duration::from_secs(self.send_time_interval);
        let due = self
            .last_time_broadcast
            .is_none_or(|last| now.saturating_duration_since(last) > interval);
        // queued writes first, then the settle pause
        if !due || !self.pending.is_empty() || !self.settled(now) {
            return;
        }

        let clock = Local::now();
        let command = time_command(clock.hour(), clock.minute());
        debug!(listener = %self.name, hour = clock.hour(), minute = clock.minute(), "Broadcasting time");
        if let Err(e) = self.write(&command) {
            warn!(listener = %self.name, error = %e, "Time broadcast failed");
        }
        self.last_time_broadcast = Some(now);
        self.last_write = Some(now);
    }

    fn poll_repeater(&mut self) {
        let Some(repeater) = self.repeater.as_mut() else {
            return;
        };
        for frame in repeater.poll() {
            if self.pending.len() >= MAX_PENDING_WRITES {
                warn!(
                    listener = %self.name,
                    %frame,
                    queued = self.pending.len(),
                    "Radio write queue full, dropping repeater frame"
                );
                continue;
            }
            info!(listener = %self.name, %frame, "Repeating frame to radio");
            self.pending.push_back(frame);
        }
    }

    fn write(&mut self, command: &str) -> io::Result<()> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "radio link closed"))?;
        link.write_all(command.as_bytes())?;
        link.flush()
    }
}

/// Time-sync command understood by the bridge
pub fn time_command(hour: u32, minute: u32) -> String {
    format!("{hour:02},00,{minute:02},00,s")
}

impl<P: Read + Write + Send> Listener for RadioListener<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "radio"
    }

    fn is_open(&self) -> bool {
        self.link.is_some()
    }

    fn read(&mut self) -> Option<Reading> {
        let link = self.link.as_mut()?;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match link.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    self.rx.extend(&chunk[..n]);
                    if n < chunk.len() {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    break
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(listener = %self.name, error = %e, "Serial read failed");
                    break;
                }
            }
        }

        let line = self.rx.next_line()?;
        decode_line(&self.name, &line, FrameShape::PackedBytes)
    }

    fn set(&mut self, spec: &ListenerSpec, now: Instant) -> Result<()> {
        match spec {
            ListenerSpec::Radio {
                runtime_settings, ..
            } => {
                self.apply(runtime_settings, now);
                Ok(())
            }
            other => Err(kind_mismatch(self, other)),
        }
    }

    fn run(&mut self, now: Instant) {
        self.poll_repeater();
        self.drain_pending(now);
        self.broadcast_time_if_due(now);
    }

    fn close(&mut self) {
        if self.link.take().is_some() {
            debug!(listener = %self.name, "Serial port closed");
        }
        self.repeater = None;
        self.pending.clear();
        self.rx.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_link::MemoryLink;
    use std::net::TcpStream;

    /// Link whose writes always fail
    struct BrokenLink;

    impl Read for BrokenLink {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    impl Write for BrokenLink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("device unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn radio(link: &MemoryLink) -> RadioListener<MemoryLink> {
        RadioListener::with_link("rfm2pi", link.clone())
    }

    fn runtime(baseid: u8, frequency: u8, group: u8) -> RadioRuntime {
        RadioRuntime {
            baseid: Some(baseid),
            frequency: Some(frequency),
            group: Some(group),
            send_time_interval: 0,
        }
    }

    #[test]
    fn test_read_packed_frame() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        link.feed(b"10 69 6 144 0\r\n");
        assert_eq!(radio.read(), Some(Reading::new(10, vec![1605, 144])));
        assert_eq!(radio.read(), None);
    }

    #[test]
    fn test_info_line_yields_nothing() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        link.feed(b"> starting\r\n");
        assert_eq!(radio.read(), None);
    }

    #[test]
    fn test_partial_frame_across_reads() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        link.feed(b"10 69 6");
        assert_eq!(radio.read(), None);
        link.feed(b" 144 0\r\n");
        assert_eq!(radio.read(), Some(Reading::new(10, vec![1605, 144])));
    }

    #[test]
    fn test_malformed_then_valid() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        link.feed(b"10 69 6 144\r\n5 1 0\r\n");
        assert_eq!(radio.read(), None);
        assert_eq!(radio.read(), Some(Reading::new(5, vec![1])));
    }

    #[test]
    fn test_set_writes_are_paced() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        let t0 = Instant::now();

        radio.apply(&runtime(15, 4, 210), t0);
        assert_eq!(link.written(), vec!["15i"]);
        assert_eq!(radio.pending_writes(), 2);

        radio.run(t0 + Duration::from_millis(500));
        assert_eq!(link.written().len(), 1);

        radio.run(t0 + Duration::from_secs(1));
        radio.run(t0 + Duration::from_secs(2));
        assert_eq!(link.written(), vec!["15i", "4b", "210g"]);
        assert_eq!(radio.pending_writes(), 0);
    }

    #[test]
    fn test_set_is_idempotent() {
        let link = MemoryLink::new();
        let mut radio = radio(&link).with_settle_time(Duration::ZERO);
        let now = Instant::now();

        radio.apply(&runtime(15, 4, 210), now);
        radio.apply(&runtime(15, 4, 210), now);
        assert_eq!(link.written(), vec!["15i", "4b", "210g"]);

        radio.apply(&runtime(15, 8, 210), now);
        assert_eq!(link.written(), vec!["15i", "4b", "210g", "8b"]);
        assert_eq!(
            radio.applied(),
            AppliedRadio {
                baseid: Some(15),
                frequency: Some(8),
                group: Some(210),
            }
        );
    }

    #[test]
    fn test_time_broadcast_interval() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        let t0 = Instant::now();

        radio.apply(
            &RadioRuntime {
                send_time_interval: 60,
                ..RadioRuntime::default()
            },
            t0,
        );
        radio.run(t0);
        radio.run(t0 + Duration::from_secs(60));
        radio.run(t0 + Duration::from_secs(61));

        let written = link.written();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|w| w.ends_with(",00,s")));
    }

    #[test]
    fn test_failed_write_is_retried_on_next_run() {
        let mut radio =
            RadioListener::with_link("rfm2pi", BrokenLink).with_settle_time(Duration::ZERO);
        let now = Instant::now();

        radio.apply(&runtime(5, 4, 210), now);
        assert_eq!(radio.pending_writes(), 3);

        radio.run(now);
        assert_eq!(radio.pending_writes(), 3);
    }

    #[test]
    fn test_time_broadcast_waits_for_settle() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        let t0 = Instant::now();

        radio.apply(
            &RadioRuntime {
                baseid: Some(15),
                send_time_interval: 60,
                ..RadioRuntime::default()
            },
            t0,
        );
        radio.run(t0);
        assert_eq!(link.written(), vec!["15i"]);

        radio.run(t0 + Duration::from_millis(500));
        assert_eq!(link.written().len(), 1);

        radio.run(t0 + Duration::from_secs(1));
        let written = link.written();
        assert_eq!(written.len(), 2);
        assert!(written[1].ends_with(",00,s"));
    }

    #[test]
    fn test_time_broadcast_disabled() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        radio.run(Instant::now());
        assert!(link.written().is_empty());
    }

    #[test]
    fn test_time_command_format() {
        assert_eq!(time_command(7, 5), "07,00,05,00,s");
        assert_eq!(time_command(23, 59), "23,00,59,00,s");
    }

    #[test]
    fn test_close_is_idempotent() {
        let link = MemoryLink::new();
        let mut radio = radio(&link);
        radio.close();
        radio.close();
        assert!(!radio.is_open());
        link.feed(b"10 69 6\r\n");
        assert_eq!(radio.read(), None);
    }

    #[test]
    fn test_repeater_frames_reach_radio() {
        let link = MemoryLink::new();
        let repeater = Repeater::bind_on("127.0.0.1", 0).unwrap();
        let mut radio = radio(&link)
            .with_settle_time(Duration::ZERO)
            .with_repeater(repeater);

        let mut client = TcpStream::connect(radio.repeater_addr().unwrap()).unwrap();
        client.write_all(b"4b\r\n").unwrap();
        drop(client);

        for _ in 0..100 {
            radio.run(Instant::now());
            if !link.written().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(link.written(), vec!["4b"]);
    }

    #[test]
    fn test_repeater_queue_is_bounded() {
        let link = MemoryLink::new();
        let repeater = Repeater::bind_on("127.0.0.1", 0).unwrap();
        let mut radio = radio(&link).with_repeater(repeater);

        let frames: String = (0..100).map(|i| format!("{i} 1\r\n")).collect();
        let mut client = TcpStream::connect(radio.repeater_addr().unwrap()).unwrap();
        client.write_all(frames.as_bytes()).unwrap();
        drop(client);

        // a fixed clock: only the first frame gets its settle slot
        let now = Instant::now();
        for _ in 0..100 {
            radio.run(now);
            if !link.written().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(link.written(), vec!["0 1"]);
        assert_eq!(radio.pending_writes(), MAX_PENDING_WRITES - 1);
    }
}

//! GatewaySettings - settings snapshot
//!
//! Shape: `{gateway, listeners: {name: spec}, buffers: {name: spec}}`.
//! Listener and buffer specs are closed, `type`-tagged enums; each variant
//! carries typed `init_settings` (fixed for the component's lifetime) and
//! `runtime_settings` (applied through `set()`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Upper bound for `batch_size`
pub const MAX_BATCH_SIZE: usize = 100;

/// Complete settings snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Process-wide settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Listener name -> listener spec
    #[serde(default)]
    pub listeners: BTreeMap<String, ListenerSpec>,

    /// Destination name -> destination spec
    #[serde(default)]
    pub buffers: BTreeMap<String, BufferSpec>,
}

/// Process-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Log filter directive (e.g. "info", "debug", "dispatcher=trace")
    #[serde(rename = "loglevel", default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// Listeners
// ============================================================================

/// Listener variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListenerSpec {
    /// RFM2Pi-style radio bridge on a serial line (packed-byte frames)
    Radio {
        #[serde(default)]
        init_settings: RadioInit,
        #[serde(default)]
        runtime_settings: RadioRuntime,
    },

    /// TCP socket feed (plain-value frames)
    Socket {
        #[serde(default)]
        init_settings: SocketInit,
        #[serde(default)]
        runtime_settings: SocketRuntime,
    },
}

impl ListenerSpec {
    /// Variant name as written in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Radio { .. } => "radio",
            Self::Socket { .. } => "socket",
        }
    }

    /// True when both specs would open the same transport
    pub fn same_init(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Radio {
                    init_settings: a, ..
                },
                Self::Radio {
                    init_settings: b, ..
                },
            ) => a == b,
            (
                Self::Socket {
                    init_settings: a, ..
                },
                Self::Socket {
                    init_settings: b, ..
                },
            ) => a == b,
            _ => false,
        }
    }
}

/// Radio bridge transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RadioInit {
    /// Serial device path
    #[serde(default = "default_serial_port")]
    #[validate(length(min = 1, message = "serial port path cannot be empty"))]
    pub port: String,

    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    #[validate(range(min = 1, message = "baud rate must be > 0"))]
    pub baud_rate: u32,

    /// TCP port whose frames are repeated onto the radio link (None = disabled)
    #[serde(default)]
    pub repeater_port: Option<u16>,
}

impl Default for RadioInit {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            repeater_port: None,
        }
    }
}

fn default_serial_port() -> String {
    "/dev/ttyAMA0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

/// Radio parameters applied over the live link
///
/// `None` leaves the radio's current value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
pub struct RadioRuntime {
    /// Node id of the bridge itself (written as `<n>i`)
    #[serde(default)]
    #[validate(range(min = 1, max = 31, message = "baseid must be within 1..=31"))]
    pub baseid: Option<u8>,

    /// Frequency band code: 4 = 433 MHz, 8 = 868 MHz, 9 = 915 MHz (written as `<n>b`)
    #[serde(default)]
    pub frequency: Option<u8>,

    /// Network group (written as `<n>g`)
    #[serde(default, alias = "sgroup")]
    #[validate(range(max = 250, message = "group must be within 0..=250"))]
    pub group: Option<u8>,

    /// Seconds between time-sync broadcasts (0 = disabled)
    #[serde(default, alias = "sendtimeinterval")]
    pub send_time_interval: u64,
}

/// Frequency band codes understood by the radio
pub const RADIO_FREQUENCY_BANDS: [u8; 3] = [4, 8, 9];

/// Socket feed transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SocketInit {
    /// Address to bind
    #[serde(default = "default_bind_address")]
    #[validate(length(min = 1, message = "bind address cannot be empty"))]
    pub bind_address: String,

    /// TCP port to listen on
    #[serde(default = "default_socket_port")]
    #[validate(range(min = 1, message = "socket port must be > 0"))]
    pub port: u16,
}

impl Default for SocketInit {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_socket_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_socket_port() -> u16 {
    50011
}

/// Socket feed has no runtime parameters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocketRuntime {}

// ============================================================================
// Destinations
// ============================================================================

/// Destination variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BufferSpec {
    /// emoncms-compatible HTTP collector
    Emoncms {
        #[serde(default)]
        init_settings: EmoncmsInit,
        runtime_settings: DestinationConfig,
    },

    /// Logs flushed batches via tracing (dry runs, debugging)
    Log {
        #[serde(default)]
        runtime_settings: FlushSettings,
    },
}

impl BufferSpec {
    /// Variant name as written in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Emoncms { .. } => "emoncms",
            Self::Log { .. } => "log",
        }
    }

    /// True when both specs would build the same uplink
    pub fn same_init(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Emoncms {
                    init_settings: a, ..
                },
                Self::Emoncms {
                    init_settings: b, ..
                },
            ) => a == b,
            (Self::Log { .. }, Self::Log { .. }) => true,
            _ => false,
        }
    }

    /// Flush scheduling part of the runtime settings
    pub fn flush_settings(&self) -> FlushSettings {
        match self {
            Self::Emoncms {
                runtime_settings, ..
            } => runtime_settings.flush_settings(),
            Self::Log { runtime_settings } => runtime_settings.clone(),
        }
    }
}

/// HTTP uplink construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EmoncmsInit {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, message = "timeout_secs must be > 0"))]
    pub timeout_secs: u64,
}

impl Default for EmoncmsInit {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

/// Destination runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DestinationConfig {
    /// URL scheme including separator ("http://" or "https://")
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Host name, optionally with port
    #[serde(alias = "domain")]
    #[validate(length(min = 1, message = "host cannot be empty"))]
    pub host: String,

    /// Path prefix with leading slash (e.g. "/emoncms")
    #[serde(default)]
    pub path: String,

    /// API key with write access
    #[serde(default, alias = "apikey")]
    pub api_key: String,

    /// Minimum seconds between two flushes (0 = every cycle)
    #[serde(default, alias = "period")]
    #[validate(range(min = 0.0, message = "flush_period must be >= 0"))]
    pub flush_period: f64,

    /// Inactive destinations neither buffer nor flush
    #[serde(default = "default_active")]
    pub active: bool,

    /// Readings per request (1 = post form, >1 = bulk form)
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 100, message = "batch_size must be within 1..=100"))]
    pub batch_size: usize,
}

impl DestinationConfig {
    /// Flush scheduling part of the configuration
    pub fn flush_settings(&self) -> FlushSettings {
        FlushSettings {
            flush_period: self.flush_period,
            active: self.active,
            batch_size: self.batch_size,
        }
    }

    /// `<protocol><host><path>`
    pub fn base_url(&self) -> String {
        format!("{}{}{}", self.protocol, self.host, self.path)
    }
}

fn default_protocol() -> String {
    "http://".to_string()
}

/// Flush scheduling settings shared by every destination type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FlushSettings {
    /// Minimum seconds between two flushes (0 = every cycle)
    #[serde(default, alias = "period")]
    #[validate(range(min = 0.0, message = "flush_period must be >= 0"))]
    pub flush_period: f64,

    /// Inactive destinations neither buffer nor flush
    #[serde(default = "default_active")]
    pub active: bool,

    /// Readings per flush
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 100, message = "batch_size must be within 1..=100"))]
    pub batch_size: usize,
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self {
            flush_period: 0.0,
            active: default_active(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_active() -> bool {
    true
}

fn default_batch_size() -> usize {
    1
}

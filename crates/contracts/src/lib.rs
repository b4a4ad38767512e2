//! # Contracts
//!
//! Shared data structures and traits for the gateway crates.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Buffered readings carry wall-clock seconds since the UNIX epoch (f64)
//! - Flush scheduling uses a monotonic clock owned by each dispatcher

mod error;
mod reading;
mod settings;
mod settings_source;
mod uplink;

pub use error::*;
pub use reading::*;
pub use settings::*;
pub use settings_source::{LocalSettingsSource, SettingsSource};
pub use uplink::*;

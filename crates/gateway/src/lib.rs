//! # Gateway
//!
//! Telemetry gateway engine.
//!
//! Responsibilities:
//! - Build listeners and dispatchers from settings snapshots
//! - Reconcile them when the snapshot changes
//! - Drive the single cooperative loop: read, fan out, flush
//!
//! ## Usage Example
//!
//! ```ignore
//! use config_loader::FileSettings;
//! use gateway::{DefaultFactory, Gateway};
//!
//! let exit = AtomicBool::new(false);
//! let mut gateway = Gateway::new(FileSettings::new("gateway.toml"), DefaultFactory);
//! gateway.run(&exit).await;
//! ```

mod engine;
mod factory;
mod registry;

#[cfg(test)]
mod testing;

// Re-exports
pub use engine::{CycleReport, Gateway, DEFAULT_TICK};
pub use factory::{ComponentFactory, DefaultFactory};
pub use registry::Registry;

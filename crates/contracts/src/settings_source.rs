//! SettingsSource trait - settings collaborator abstraction
//!
//! A settings source is polled from the main loop. It owns the current
//! snapshot and reports whether the last poll changed it.

use crate::GatewaySettings;

/// Settings collaborator
///
/// Implementations rate-limit their own polling; calling `check_settings`
/// on every loop iteration is expected.
#[trait_variant::make(SettingsSource: Send)]
pub trait LocalSettingsSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Poll the source
    ///
    /// Returns true when the snapshot changed since the previous call.
    /// Fetch failures are logged and reported as "unchanged".
    async fn check_settings(&mut self) -> bool;

    /// Current snapshot
    fn settings(&self) -> &GatewaySettings;
}

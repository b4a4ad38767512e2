//! MemorySettings - settings held in memory

use contracts::{GatewaySettings, SettingsSource};

/// Settings source whose snapshot is replaced programmatically
///
/// The first poll reports the initial snapshot as a change.
#[derive(Debug, Clone)]
pub struct MemorySettings {
    settings: GatewaySettings,
    changed: bool,
}

impl MemorySettings {
    /// Create a source holding `settings`
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            settings,
            changed: true,
        }
    }

    /// Replace the snapshot; the next poll reports a change if it differs
    pub fn replace(&mut self, settings: GatewaySettings) {
        if settings != self.settings {
            self.settings = settings;
            self.changed = true;
        }
    }
}

impl SettingsSource for MemorySettings {
    fn name(&self) -> &str {
        "memory"
    }

    async fn check_settings(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn settings(&self) -> &GatewaySettings {
        &self.settings
    }
}

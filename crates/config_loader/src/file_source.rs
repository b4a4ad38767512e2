//! FileSettings - settings polled from a local TOML/JSON file

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use contracts::{GatewaySettings, SettingsSource};
use tracing::{debug, instrument, warn};

use crate::ConfigLoader;

/// Default minimum time between two reads of the settings file
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settings source backed by a file on disk
///
/// The file is re-read at most once per poll interval. An unreadable or
/// invalid file keeps the previous snapshot in place.
pub struct FileSettings {
    path: PathBuf,
    settings: GatewaySettings,
    poll_interval: Duration,
    last_poll: Option<Instant>,
}

impl FileSettings {
    /// Create a source for `path`; nothing is read until the first poll
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: GatewaySettings::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_poll: None,
        }
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Settings file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn poll_due(&self, now: Instant) -> bool {
        self.last_poll
            .is_none_or(|last| now.duration_since(last) >= self.poll_interval)
    }
}

impl SettingsSource for FileSettings {
    fn name(&self) -> &str {
        "file"
    }

    #[instrument(name = "file_settings_check", skip(self), fields(path = %self.path.display()))]
    async fn check_settings(&mut self) -> bool {
        let now = Instant::now();
        if !self.poll_due(now) {
            return false;
        }
        self.last_poll = Some(now);

        match ConfigLoader::load_from_path(&self.path) {
            Ok(settings) if settings != self.settings => {
                debug!("Settings file changed");
                self.settings = settings;
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "Couldn't load settings, keeping previous snapshot");
                false
            }
        }
    }

    fn settings(&self) -> &GatewaySettings {
        &self.settings
    }
}

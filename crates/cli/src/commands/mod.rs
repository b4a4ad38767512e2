//! Command implementations.

mod info;
mod run;
mod show_settings;
mod validate;

pub use info::run_info;
pub use run::run_gateway;
pub use show_settings::run_show_settings;
pub use validate::run_validate;

use std::path::Path;

use contracts::GatewaySettings;

use crate::error::{CliError, Result};

/// Load and validate a settings file
pub(crate) fn load_settings(path: &Path) -> Result<GatewaySettings> {
    if !path.exists() {
        return Err(CliError::settings_not_found(path.display().to_string()));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}

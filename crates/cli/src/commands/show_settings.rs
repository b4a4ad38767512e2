//! `show-settings` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, EmoncmsEndpoint, EmoncmsSettings};
use tracing::info;

use crate::cli::ShowSettingsArgs;

/// Execute the `show-settings` command
pub async fn run_show_settings(args: &ShowSettingsArgs) -> Result<()> {
    let endpoint = EmoncmsEndpoint::parse(&args.emoncms)
        .with_context(|| format!("Invalid emoncms URL '{}'", args.emoncms))?;
    info!(emoncms = %endpoint.base_url(), "Fetching settings");

    let settings = EmoncmsSettings::new(endpoint, args.serial_port.clone())
        .context("Failed to create emoncms settings source")?
        .fetch()
        .await
        .context("Failed to fetch settings from emoncms")?;

    let rendered = if args.json {
        ConfigLoader::to_json(&settings)?
    } else {
        ConfigLoader::to_toml(&settings)?
    };
    println!("{}", rendered);

    Ok(())
}

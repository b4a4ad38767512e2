//! EmoncmsSettings - settings polled from an emoncms instance
//!
//! emoncms exposes the gateway settings as a flat JSON object of strings at
//! `<base>/raspberrypi/get.json`, e.g.
//! `{"userid":"1","sgroup":"210","frequency":"4","baseid":"15",...}`.
//! Each poll also reports liveness through `<base>/raspberrypi/setrunning.json`.

use std::str::FromStr;
use std::time::{Duration, Instant};

use contracts::{
    BufferSpec, ContractError, DestinationConfig, EmoncmsInit, GatewayConfig, GatewaySettings,
    ListenerSpec, RadioInit, RadioRuntime, SettingsSource,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::ConfigLoader;

const SOURCE_NAME: &str = "emoncms";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Listener name used for the radio bridge
pub const RADIO_LISTENER_NAME: &str = "RFM2Pi";
/// Destination name of the emoncms instance the settings come from
pub const LOCAL_BUFFER_NAME: &str = "emoncms_local";
/// Destination name of the optional remote emoncms
pub const REMOTE_BUFFER_NAME: &str = "emoncms_remote";
/// Flush period of the remote destination, in seconds
const REMOTE_FLUSH_PERIOD: f64 = 30.0;

/// Location of an emoncms instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmoncmsEndpoint {
    /// "http://" or "https://"
    pub protocol: String,
    /// Host name, optionally with port
    pub host: String,
    /// Path prefix with leading slash, or empty
    pub path: String,
}

impl Default for EmoncmsEndpoint {
    fn default() -> Self {
        Self {
            protocol: "http://".to_string(),
            host: "localhost".to_string(),
            path: "/emoncms".to_string(),
        }
    }
}

impl EmoncmsEndpoint {
    /// Split a base URL such as `http://localhost/emoncms`
    pub fn parse(url: &str) -> Result<Self, ContractError> {
        let scheme_end = url.find("://").ok_or_else(|| {
            ContractError::config_validation("emoncms url", format!("missing scheme in '{url}'"))
        })? + 3;
        let (protocol, rest) = url.split_at(scheme_end);
        let rest = rest.trim_end_matches('/');
        let (host, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        if host.is_empty() {
            return Err(ContractError::config_validation(
                "emoncms url",
                format!("missing host in '{url}'"),
            ));
        }

        Ok(Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            path: path.to_string(),
        })
    }

    /// `<protocol><host><path>`
    pub fn base_url(&self) -> String {
        format!("{}{}{}", self.protocol, self.host, self.path)
    }
}

/// Settings source backed by the emoncms `raspberrypi` module
pub struct EmoncmsSettings {
    endpoint: EmoncmsEndpoint,
    serial_port: String,
    client: reqwest::Client,
    settings: GatewaySettings,
    poll_interval: Duration,
    last_poll: Option<Instant>,
}

impl EmoncmsSettings {
    /// Create a source polling `endpoint`
    ///
    /// `serial_port` is used for the radio listener since emoncms does not
    /// carry it.
    ///
    /// # Errors
    /// The HTTP client could not be built
    pub fn new(
        endpoint: EmoncmsEndpoint,
        serial_port: impl Into<String>,
    ) -> Result<Self, ContractError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ContractError::settings_fetch(SOURCE_NAME, format!("http client: {e}"))
            })?;
        Ok(Self {
            endpoint,
            serial_port: serial_port.into(),
            client,
            settings: GatewaySettings::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_poll: None,
        })
    }

    /// Fetch and map the settings once
    #[instrument(name = "emoncms_settings_fetch", skip(self), fields(base = %self.endpoint.base_url()))]
    pub async fn fetch(&self) -> Result<GatewaySettings, ContractError> {
        let url = format!("{}/raspberrypi/get.json", self.endpoint.base_url());
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ContractError::settings_fetch(SOURCE_NAME, e.to_string()))?
            .text()
            .await
            .map_err(|e| ContractError::settings_fetch(SOURCE_NAME, e.to_string()))?;

        let raw: Map<String, Value> = serde_json::from_str(&body).map_err(|e| {
            ContractError::settings_fetch(SOURCE_NAME, format!("invalid settings json: {e}"))
        })?;

        let settings = map_settings(&raw, &self.endpoint, &self.serial_port)?;
        ConfigLoader::validate(&settings)?;
        Ok(settings)
    }

    async fn report_running(&self) {
        let url = format!("{}/raspberrypi/setrunning.json", self.endpoint.base_url());
        if let Err(e) = self.client.get(&url).send().await {
            warn!(error = %e, "Couldn't update \"running\" status");
        }
    }
}

impl SettingsSource for EmoncmsSettings {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn check_settings(&mut self) -> bool {
        let now = Instant::now();
        if self
            .last_poll
            .is_some_and(|last| now.duration_since(last) < self.poll_interval)
        {
            return false;
        }
        self.last_poll = Some(now);

        self.report_running().await;

        match self.fetch().await {
            Ok(settings) if settings != self.settings => {
                debug!("emoncms settings changed");
                self.settings = settings;
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "Couldn't get settings");
                false
            }
        }
    }

    fn settings(&self) -> &GatewaySettings {
        &self.settings
    }
}

/// Map the flat emoncms key set onto a settings snapshot
pub fn map_settings(
    raw: &Map<String, Value>,
    local: &EmoncmsEndpoint,
    serial_port: &str,
) -> Result<GatewaySettings, ContractError> {
    let mut settings = GatewaySettings {
        gateway: GatewayConfig::default(),
        ..Default::default()
    };

    settings.listeners.insert(
        RADIO_LISTENER_NAME.to_string(),
        ListenerSpec::Radio {
            init_settings: RadioInit {
                port: serial_port.to_string(),
                ..RadioInit::default()
            },
            runtime_settings: RadioRuntime {
                baseid: optional_number(raw, "baseid")?,
                frequency: optional_number(raw, "frequency")?,
                group: optional_number(raw, "sgroup")?,
                send_time_interval: optional_number(raw, "sendtimeinterval")?.unwrap_or(0),
            },
        },
    );

    settings.buffers.insert(
        LOCAL_BUFFER_NAME.to_string(),
        BufferSpec::Emoncms {
            init_settings: EmoncmsInit::default(),
            runtime_settings: DestinationConfig {
                protocol: local.protocol.clone(),
                host: local.host.clone(),
                path: local.path.clone(),
                api_key: string_field(raw, "apikey")?,
                flush_period: 0.0,
                active: true,
                batch_size: 1,
            },
        },
    );

    // emoncms reports an empty domain when no remote server is configured
    let remote_host = string_field(raw, "remotedomain").unwrap_or_default();
    if !remote_host.is_empty() {
        settings.buffers.insert(
            REMOTE_BUFFER_NAME.to_string(),
            BufferSpec::Emoncms {
                init_settings: EmoncmsInit::default(),
                runtime_settings: DestinationConfig {
                    protocol: string_field(raw, "remoteprotocol")?,
                    host: remote_host,
                    path: string_field(raw, "remotepath").unwrap_or_default(),
                    api_key: string_field(raw, "remoteapikey")?,
                    flush_period: REMOTE_FLUSH_PERIOD,
                    active: optional_number::<i64>(raw, "remotesend")?.unwrap_or(0) != 0,
                    batch_size: 1,
                },
            },
        );
    }

    Ok(settings)
}

/// Read a field as a string; numbers are accepted and rendered
fn string_field(raw: &Map<String, Value>, key: &str) -> Result<String, ContractError> {
    match raw.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ContractError::settings_fetch(
            SOURCE_NAME,
            format!("field '{key}' has unexpected value {other}"),
        )),
        None => Err(ContractError::settings_fetch(
            SOURCE_NAME,
            format!("missing field '{key}'"),
        )),
    }
}

/// Read a numeric field stored as string or number; empty / missing -> None
fn optional_number<T: FromStr>(
    raw: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>, ContractError> {
    let text = match raw.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(_) => string_field(raw, key)?,
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse().map(Some).map_err(|_| {
        ContractError::settings_fetch(
            SOURCE_NAME,
            format!("field '{key}' is not a valid number: '{text}'"),
        )
    })
}

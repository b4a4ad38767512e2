//! EmoncmsUplink - HTTP GET against an emoncms input API
//!
//! Two request forms:
//! - single: `<base>/input/post.json?apikey=K&time=T&node=N&json={1:v1,2:v2}`
//! - bulk:   `<base>/input/bulk.json?apikey=K&data=[[offset,node,v1,...],...]`
//!
//! The destination acknowledges with a body whose first line is `ok`.

use std::time::Duration;

use contracts::{DestinationConfig, EmoncmsInit, SendError, TimestampedReading, Uplink};
use tracing::{debug, instrument};

use crate::error::DispatcherError;

/// Uplink posting readings to emoncms
#[derive(Debug)]
pub struct EmoncmsUplink {
    name: String,
    client: reqwest::Client,
    destination: DestinationConfig,
}

impl EmoncmsUplink {
    /// Build the HTTP client
    pub fn new(
        name: impl Into<String>,
        init: &EmoncmsInit,
        destination: DestinationConfig,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(init.timeout_secs))
            .build()
            .map_err(|e| DispatcherError::uplink_creation(&name, e.to_string()))?;

        Ok(Self {
            name,
            client,
            destination,
        })
    }

    /// Destination currently in use
    pub fn destination(&self) -> &DestinationConfig {
        &self.destination
    }

    /// Request URL for a batch; single form for one reading, bulk otherwise
    pub fn request_url(&self, batch: &[TimestampedReading], now: f64) -> Option<String> {
        let base = self.destination.base_url();
        let api_key = &self.destination.api_key;
        match batch {
            [] => None,
            [item] => Some(single_url(&base, api_key, item)),
            items => Some(bulk_url(&base, api_key, items, now)),
        }
    }

    async fn request(&self, url: &str) -> Result<(), SendError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(classify)?;
        let reply = body.lines().next().unwrap_or_default().trim();
        if reply == "ok" {
            Ok(())
        } else {
            Err(SendError::protocol(format!("unexpected reply '{reply}'")))
        }
    }
}

/// Single-reading post form
pub fn single_url(base: &str, api_key: &str, item: &TimestampedReading) -> String {
    let json = item
        .reading
        .values
        .iter()
        .enumerate()
        .map(|(index, value)| format!("{}:{}", index + 1, value))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{base}/input/post.json?apikey={api_key}&time={}&node={}&json={{{json}}}",
        item.timestamp, item.reading.node_id
    )
}

/// Bulk post form; timestamps are sent as whole-second offsets from `now`
pub fn bulk_url(base: &str, api_key: &str, batch: &[TimestampedReading], now: f64) -> String {
    let data = batch
        .iter()
        .map(|item| {
            let fields = [item.offset_from(now), item.reading.node_id]
                .into_iter()
                .chain(item.reading.values.iter().copied())
                .map(|field| field.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!("[{fields}]")
        })
        .collect::<Vec<_>>()
        .join(",");

    format!("{base}/input/bulk.json?apikey={api_key}&data=[{data}]")
}

fn classify(e: reqwest::Error) -> SendError {
    if let Some(status) = e.status() {
        SendError::Http {
            status: status.as_u16(),
        }
    } else if e.is_timeout() || e.is_connect() || e.is_request() {
        SendError::transport(e.to_string())
    } else if e.is_decode() || e.is_body() {
        SendError::protocol(e.to_string())
    } else {
        SendError::unexpected(e.to_string())
    }
}

impl Uplink for EmoncmsUplink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "emoncms_uplink_send",
        skip(self, batch, now),
        fields(uplink = %self.name, host = %self.destination.host, items = batch.len())
    )]
    async fn send(&mut self, batch: &[TimestampedReading], now: f64) -> Result<(), SendError> {
        let Some(url) = self.request_url(batch, now) else {
            return Ok(());
        };
        debug!(path = %self.destination.path, "Sending batch");
        self.request(&url).await
    }

    fn set_destination(&mut self, destination: &DestinationConfig) {
        if &self.destination != destination {
            debug!(uplink = %self.name, host = %destination.host, "Destination updated");
            self.destination = destination.clone();
        }
    }
}

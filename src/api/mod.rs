pub mod endpoint;
pub mod error;
pub mod response;

use crate::model::{Device, TelemetryReading};
pub use error::Error;
use http::header::CONTENT_TYPE;
use response::DeviceQuota;
use std::time::Duration;

const USER_AGENT: &str = "prometheus-ecoflow-exporter";
const APP_KEY: &str = "appKey";
const SECRET_KEY: &str = "secretKey";

/// Client for the device quota API.
///
/// A single instance is shared by all collectors so connections to the API are pooled. Every
/// request is bounded by `timeout`, covering connect, send and reading the whole body.
#[derive(Debug, Clone)]
pub struct Client {
    api_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl Client {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        if timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }

        let api_url = api_url.into();
        match reqwest::Url::parse(&api_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(Error::Config(format!(
                    "unsupported api_url scheme {:?}",
                    url.scheme()
                )))
            }
            Err(e) => return Err(Error::Config(format!("invalid api_url {:?}: {}", api_url, e))),
        }

        let client = reqwest::ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Client {
            api_url: api_url.trim_end_matches('/').to_owned(),
            timeout,
            client,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query current telemetry of `device`. Exactly one attempt is made.
    ///
    /// A decoded response is returned as is, whatever its `code`; interpreting it is up to the
    /// caller. Any failure on the way there ends up as `Error::Transport`.
    pub async fn fetch(&self, device: &Device) -> Result<TelemetryReading, Error> {
        let url = format!("{}{}", self.api_url, endpoint::DEVICE_QUOTA);

        let response = self
            .client
            .get(url)
            .query(&[("sn", device.serial_number.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .header(APP_KEY, device.app_key.as_str())
            .header(SECRET_KEY, device.secret_key.as_str())
            .send()
            .await?;

        /* Body is read before looking at the status so the connection is always drained */
        let status = response.status();
        let body = response.bytes().await?;

        log::trace!(
            "sn: {}, status: {}, response_text: {}",
            device.serial_number,
            status,
            String::from_utf8_lossy(&body)
        );

        if !status.is_success() {
            return Err(Error::Transport(format!("upstream responded {}", status)));
        }

        let quota: DeviceQuota = serde_json::from_slice(&body)
            .map_err(|e| Error::Transport(format!("invalid response: {}", e)))?;

        Ok(quota.into())
    }
}

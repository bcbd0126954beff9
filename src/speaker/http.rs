use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything except unreserved characters is escaped, slashes included.
const URL_PARAM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("device returned HTTP {0}")]
    Status(StatusCode),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub fn encode_param(value: &str) -> String {
    utf8_percent_encode(value, URL_PARAM).to_string()
}

/// Build `http://{host}/{endpoint}[?k=v&...]`. Values are inserted as given.
pub fn command_url(host: &str, endpoint: &str, params: &[(&str, String)]) -> String {
    let mut url = format!("http://{host}/{endpoint}");
    if !params.is_empty() {
        let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}

/// Client for the speaker's embedded web server.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    host: String,
    timeout: Duration,
}

impl DeviceClient {
    pub fn new(http: reqwest::Client, host: impl Into<String>) -> Self {
        Self {
            http,
            host: host.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn set_volume(&self, level: f64) -> bool {
        // Debug formatting keeps the decimal point: 1.0 -> "1.0", 0.75 -> "0.75".
        self.send("volume", &[("level", format!("{level:?}"))]).await
    }

    pub async fn play_url(&self, url: &str) -> bool {
        self.send("play", &[("url", encode_param(url))]).await
    }

    pub async fn stop(&self) -> bool {
        self.send("stop", &[]).await
    }

    /// Fire one GET and log the outcome. Returns `true` only on HTTP 200.
    pub async fn send(&self, endpoint: &str, params: &[(&str, String)]) -> bool {
        let url = command_url(&self.host, endpoint, params);
        match self.request(&url).await {
            Ok(()) => {
                debug!("Command {} accepted by {}", endpoint, self.host);
                true
            }
            Err(CommandError::Status(status)) => {
                error!("HTTP command failed: {}", status.as_u16());
                false
            }
            Err(e) => {
                error!("Error sending command to {}: {}", url, e);
                false
            }
        }
    }

    async fn request(&self, url: &str) -> Result<(), CommandError> {
        let response = tokio::time::timeout(self.timeout, self.http.get(url).send())
            .await
            .map_err(|_| CommandError::Timeout)??;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(CommandError::Status(status))
        }
    }
}

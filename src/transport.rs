//! The upstream fetch capability.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::entry::Payload;
use crate::error::FetchError;

/// Performs the real fetch for a target. Possibly slow, possibly failing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A name for tracing.
    fn name(&self) -> &'static str;

    async fn fetch(&self, target: &str) -> Result<Payload, FetchError>;
}

/// Configuration for HttpTransport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL relative targets are resolved against.
    ///
    /// # Examples
    /// - `http://localhost:3000`
    /// - `https://demo.example.com`
    pub base_url: String,

    /// Per-request timeout. Expiry surfaces as a transport failure.
    pub timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        HttpTransportConfig {
            base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// JSON-over-HTTP transport.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            FetchError::Config(format!("invalid base url '{}': {}", config.base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport { client, base_url })
    }

    /// Resolve `target` against the base URL. Absolute targets are used as-is.
    pub fn url_for(&self, target: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(target)
            .map_err(|e| FetchError::transport(target, format!("invalid target: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, target: &str) -> Result<Payload, FetchError> {
        let url = self.url_for(target)?;
        tracing::debug!(%url, "http fetch");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(target, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transport(target, format!("HTTP {}", status)));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::transport(target, format!("invalid JSON body: {}", e)))?;

        Ok(Payload::new(value))
    }
}

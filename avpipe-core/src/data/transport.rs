//! HTTP transport for provider requests.
//!
//! A transport performs exactly one GET and returns the decoded JSON body.
//! Retries and payload inspection live in the client above it.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Alpha Vantage query endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Fixed per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("response is not valid JSON: {0}")]
    Decode(String),

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// One GET request with query parameters.
pub trait Transport: Send + Sync {
    fn get(&self, params: &[(&str, &str)]) -> Result<Value, TransportError>;
}

/// Blocking reqwest transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(params)
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        resp.json::<Value>()
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

//! Market data provider trait and structured error types.
//!
//! The `MarketDataApi` trait is the seam between the pipeline and the
//! provider, so the orchestrator can run against a scripted fake in tests.

use super::transport::TransportError;
use crate::domain::CompanyOverview;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Daily series section of a provider response: date string → OHLCV fields.
pub type RawSeries = serde_json::Map<String, serde_json::Value>;

/// A payload together with the wall time of the request that produced it.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub payload: T,
    pub elapsed: Duration,
}

/// How much history a daily series request returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    /// Latest 100 bars.
    #[default]
    Compact,
    /// Full history.
    Full,
}

impl OutputSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

impl fmt::Display for OutputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(OutputSize::Compact),
            "full" => Ok(OutputSize::Full),
            other => Err(format!("unknown output size '{other}' (expected compact or full)")),
        }
    }
}

/// Errors from provider requests.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("no daily time series returned for {symbol}")]
    MissingSeries { symbol: String },

    #[error("request failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    /// The underlying cause, looking through retry exhaustion.
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

/// Trait for market data providers.
pub trait MarketDataApi {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch company overview fields for a symbol.
    fn fetch_overview(&self, symbol: &str) -> Result<Fetched<CompanyOverview>, ApiError>;

    /// Fetch the daily series section for a symbol.
    fn fetch_daily_series(
        &self,
        symbol: &str,
        size: OutputSize,
    ) -> Result<Fetched<RawSeries>, ApiError>;
}

//! Alpha Vantage client.
//!
//! Builds `OVERVIEW` and `TIME_SERIES_DAILY_ADJUSTED` queries, inspects each
//! response for the provider's in-band error markers, and retries failed
//! attempts according to a [`RetryPolicy`].
//!
//! Alpha Vantage answers rate-limited requests with HTTP 200 and a `"Note"`
//! (older) or `"Information"` (newer) key instead of data, so status codes
//! alone do not tell success from failure.

use super::provider::{ApiError, Fetched, MarketDataApi, OutputSize, RawSeries};
use super::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use super::transform::parse_overview;
use super::transport::{HttpTransport, Transport, TransportError};
use crate::domain::CompanyOverview;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, warn};

/// Response key holding the daily bars.
pub const DAILY_SERIES_KEY: &str = "Time Series (Daily)";

const RATE_LIMIT_KEYS: [&str; 2] = ["Note", "Information"];
const ERROR_MESSAGE_KEY: &str = "Error Message";

pub struct AlphaVantageClient<T: Transport = HttpTransport> {
    transport: T,
    api_key: String,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl AlphaVantageClient<HttpTransport> {
    /// Client against the public endpoint.
    pub fn connect(api_key: impl Into<String>, policy: RetryPolicy) -> Result<Self, TransportError> {
        Ok(Self::new(HttpTransport::new()?, api_key, policy))
    }
}

impl<T: Transport> AlphaVantageClient<T> {
    pub fn new(transport: T, api_key: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            policy,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Issue a query, retrying failed attempts.
    ///
    /// Returns the response object and the elapsed time of the attempt that
    /// succeeded.
    pub fn request(&self, params: &[(&str, &str)]) -> Result<Fetched<Map<String, Value>>, ApiError> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("apikey", self.api_key.as_str()));

        let attempts = self.policy.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(&query) {
                Ok(fetched) => {
                    debug!(attempt, elapsed_ms = fetched.elapsed.as_millis() as u64, "request succeeded");
                    return Ok(fetched);
                }
                Err(e) if !self.policy.is_retryable(&e) => return Err(e),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "request attempt failed");
                    // Every retryable failure backs off, the last one included.
                    self.sleeper.sleep(self.policy.delay_for(attempt));
                    last_error = Some(e);
                }
            }
        }

        Err(ApiError::Exhausted {
            attempts,
            last: Box::new(
                last_error.unwrap_or_else(|| ApiError::Malformed("no attempt was made".into())),
            ),
        })
    }

    /// A single attempt: one transport call plus payload inspection.
    fn attempt(&self, query: &[(&str, &str)]) -> Result<Fetched<Map<String, Value>>, ApiError> {
        let start = Instant::now();
        let body = self.transport.get(query)?;
        let elapsed = start.elapsed();

        let Value::Object(payload) = body else {
            return Err(ApiError::Malformed("response body is not a JSON object".into()));
        };

        if let Some(note) = RATE_LIMIT_KEYS.iter().find_map(|k| payload.get(*k)) {
            return Err(ApiError::RateLimited(message_text(note)));
        }
        if let Some(message) = payload.get(ERROR_MESSAGE_KEY) {
            return Err(ApiError::Provider(message_text(message)));
        }

        Ok(Fetched { payload, elapsed })
    }
}

impl<T: Transport> MarketDataApi for AlphaVantageClient<T> {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fetch_overview(&self, symbol: &str) -> Result<Fetched<CompanyOverview>, ApiError> {
        let fetched = self.request(&[("function", "OVERVIEW"), ("symbol", symbol)])?;
        Ok(Fetched {
            payload: parse_overview(&fetched.payload),
            elapsed: fetched.elapsed,
        })
    }

    fn fetch_daily_series(
        &self,
        symbol: &str,
        size: OutputSize,
    ) -> Result<Fetched<RawSeries>, ApiError> {
        let fetched = self.request(&[
            ("function", "TIME_SERIES_DAILY_ADJUSTED"),
            ("symbol", symbol),
            ("outputsize", size.as_str()),
        ])?;
        let Fetched {
            mut payload,
            elapsed,
        } = fetched;

        match payload.remove(DAILY_SERIES_KEY) {
            Some(Value::Object(series)) => Ok(Fetched {
                payload: series,
                elapsed,
            }),
            _ => Err(ApiError::MissingSeries {
                symbol: symbol.to_string(),
            }),
        }
    }
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

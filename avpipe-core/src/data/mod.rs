//! Market data acquisition: transport, retrying client, payload transforms.

pub mod alphavantage;
pub mod provider;
pub mod retry;
pub mod transform;
pub mod transport;

pub use alphavantage::AlphaVantageClient;
pub use provider::{ApiError, Fetched, MarketDataApi, OutputSize, RawSeries};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use transform::{parse_daily_series, parse_overview, TransformError};
pub use transport::{HttpTransport, Transport, TransportError, DEFAULT_BASE_URL};

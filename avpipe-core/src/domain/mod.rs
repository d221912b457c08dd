//! Domain types for the ingestion pipeline.

pub mod indicator;
pub mod price;
pub mod run_log;
pub mod ticker;

pub use indicator::{ClosePoint, IndicatorDatum, IndicatorPoint};
pub use price::{PriceBar, PriceDatum};
pub use run_log::{request_seconds, RunLogEntry, RunStatus};
pub use ticker::{CompanyInfo, CompanyOverview, Ticker};

/// Ticker id as assigned by the store.
pub type TickerId = i64;

/// Label stored on every ticker created by this pipeline.
pub const DEFAULT_SOURCE: &str = "AlphaVantage";

/// Canonical form of a ticker symbol: trimmed and uppercased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

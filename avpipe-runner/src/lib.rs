//! avpipe runner: settings, the per-ticker ETL pipeline, progress output and
//! CSV export.
//!
//! This crate builds on `avpipe-core` to provide:
//! - Layered configuration (defaults, TOML file, `.env`/environment)
//! - The sequential pipeline with per-ticker transactions and audit rows
//! - Console progress reporting
//! - CSV export of joined price and indicator history

pub mod config;
pub mod export;
pub mod pipeline;
pub mod progress;

pub use config::{ConfigError, Settings, DEFAULT_TICKERS};
pub use export::export_history_csv;
pub use pipeline::{Pipeline, PipelineError, RunSummary, TickerOutcome};
pub use progress::{NoProgress, RunProgress, StdoutProgress};

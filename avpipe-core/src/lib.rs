//! avpipe core: domain types, indicators, Alpha Vantage client, SQLite store.
//!
//! This crate contains everything the per-ticker pipeline is built from:
//! - Domain types (tickers, company info, exact-decimal price bars, indicators, audit rows)
//! - RSI/SMA/EMA calculation over a close series
//! - A retrying Alpha Vantage client behind the `MarketDataApi` trait
//! - Payload transforms from provider JSON to typed bars
//! - SQLite persistence with per-ticker transactions

pub mod data;
pub mod domain;
pub mod indicators;
pub mod store;

pub use data::{AlphaVantageClient, ApiError, Fetched, MarketDataApi, OutputSize, RetryPolicy};
pub use store::{Store, StoreError, StoreTx};

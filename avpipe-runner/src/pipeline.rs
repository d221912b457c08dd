//! Per-ticker ETL orchestration.
//!
//! Each ticker runs inside one store transaction:
//!
//! 1. resolve or create the ticker
//! 2. fetch the overview and upsert company info
//! 3. fetch and parse the daily series
//! 4. insert bars for dates not yet stored
//! 5. recompute indicators over the full stored history and replace them
//! 6. commit
//!
//! Any error before the commit drops the transaction, which rolls back every
//! write for that ticker. An audit row is appended afterwards in both cases,
//! carrying the time spent in external calls. Tickers are independent: one
//! failure never stops the batch.

use crate::progress::{NoProgress, RunProgress};
use avpipe_core::data::{parse_daily_series, ApiError, MarketDataApi, OutputSize, TransformError};
use avpipe_core::domain::{normalize_symbol, request_seconds, RunStatus, DEFAULT_SOURCE};
use avpipe_core::indicators::calculate_indicators;
use avpipe_core::store::{Store, StoreError, StoreTx};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("empty ticker symbol")]
    EmptySymbol,
}

/// Result of processing one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerOutcome {
    pub symbol: String,
    pub status: RunStatus,
    /// Bars returned by the provider.
    pub rows_fetched: usize,
    /// Bars actually inserted (dates not stored before).
    pub rows_inserted: usize,
    pub indicators_written: usize,
    /// Seconds spent in external calls, as written to the audit log.
    pub request_time: f64,
    pub error: Option<String>,
}

impl TickerOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Outcomes of a batch run, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<TickerOutcome>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn rows_inserted(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows_inserted).sum()
    }
}

/// Counts from a committed ticker load.
#[derive(Debug, Clone, Copy, Default)]
struct LoadStats {
    fetched: usize,
    inserted: usize,
    indicators: usize,
}

/// Sequential ETL driver over a store and a market data provider.
pub struct Pipeline<A: MarketDataApi> {
    store: Store,
    api: A,
    output_size: OutputSize,
}

impl<A: MarketDataApi> Pipeline<A> {
    /// Wraps a store whose schema has been initialised.
    pub fn new(store: Store, api: A) -> Self {
        Self {
            store,
            api,
            output_size: OutputSize::Compact,
        }
    }

    pub fn with_output_size(mut self, output_size: OutputSize) -> Self {
        self.output_size = output_size;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    /// Process every symbol in order without progress output.
    pub fn run<S: AsRef<str>>(&mut self, symbols: &[S]) -> RunSummary {
        self.run_with_progress(symbols, &mut NoProgress)
    }

    pub fn run_with_progress<S: AsRef<str>>(
        &mut self,
        symbols: &[S],
        progress: &mut dyn RunProgress,
    ) -> RunSummary {
        let start = Instant::now();
        let total = symbols.len();
        info!(provider = self.api.name(), tickers = total, "starting run");

        let mut summary = RunSummary::default();
        for (index, symbol) in symbols.iter().enumerate() {
            progress.ticker_started(symbol.as_ref(), index, total);
            let outcome = self.process_symbol(symbol.as_ref());
            progress.ticker_finished(&outcome);
            summary.outcomes.push(outcome);
        }
        summary.elapsed_secs = start.elapsed().as_secs_f64();

        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            rows_inserted = summary.rows_inserted(),
            elapsed_secs = summary.elapsed_secs,
            "run complete"
        );
        progress.run_finished(&summary);
        summary
    }

    /// Load one ticker and append its audit row.
    pub fn process_symbol(&mut self, raw_symbol: &str) -> TickerOutcome {
        let symbol = normalize_symbol(raw_symbol);
        let mut elapsed = Duration::ZERO;

        let result = if symbol.is_empty() {
            Err(PipelineError::EmptySymbol)
        } else {
            load_in_transaction(
                &mut self.store,
                &self.api,
                &symbol,
                self.output_size,
                &mut elapsed,
            )
        };

        let status = if result.is_ok() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        if let Err(e) = self.store.append_run_log(&symbol, status, elapsed) {
            warn!(symbol = %symbol, error = %e, "failed to write audit row");
        }

        let request_time = request_seconds(elapsed);
        match result {
            Ok(stats) => {
                info!(
                    symbol = %symbol,
                    fetched = stats.fetched,
                    inserted = stats.inserted,
                    indicators = stats.indicators,
                    request_time,
                    "ticker loaded"
                );
                TickerOutcome {
                    symbol,
                    status,
                    rows_fetched: stats.fetched,
                    rows_inserted: stats.inserted,
                    indicators_written: stats.indicators,
                    request_time,
                    error: None,
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, request_time, "ticker failed");
                TickerOutcome {
                    symbol,
                    status,
                    rows_fetched: 0,
                    rows_inserted: 0,
                    indicators_written: 0,
                    request_time,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn load_in_transaction<A: MarketDataApi>(
    store: &mut Store,
    api: &A,
    symbol: &str,
    output_size: OutputSize,
    elapsed: &mut Duration,
) -> Result<LoadStats, PipelineError> {
    let tx = store.begin()?;
    let stats = load_ticker(&tx, api, symbol, output_size, elapsed)?;
    tx.commit()?;
    Ok(stats)
}

/// Steps 1-5. `elapsed` accumulates provider time even when a later step fails.
fn load_ticker<A: MarketDataApi>(
    tx: &StoreTx<'_>,
    api: &A,
    symbol: &str,
    output_size: OutputSize,
    elapsed: &mut Duration,
) -> Result<LoadStats, PipelineError> {
    let mut ticker = tx.get_or_create_ticker(symbol, DEFAULT_SOURCE)?;
    debug!(symbol, ticker_id = ticker.id, "ticker resolved");

    let overview = api.fetch_overview(symbol)?;
    *elapsed += overview.elapsed;
    tx.upsert_company_info(&mut ticker, &overview.payload)?;

    let series = api.fetch_daily_series(symbol, output_size)?;
    *elapsed += series.elapsed;
    let bars = parse_daily_series(&series.payload)?;

    let existing = tx.existing_price_dates(ticker.id)?;
    let fresh: Vec<_> = bars
        .iter()
        .filter(|bar| !existing.contains(&bar.date))
        .cloned()
        .map(|bar| bar.into_datum(ticker.id))
        .collect();
    let inserted = tx.insert_prices(&fresh)?;
    debug!(symbol, fetched = bars.len(), inserted, "prices stored");

    let history = tx.close_history(ticker.id)?;
    let rows: Vec<_> = calculate_indicators(&history)
        .into_iter()
        .map(|point| point.into_datum(ticker.id))
        .collect();
    let indicators = tx.replace_indicators(ticker.id, &rows)?;

    Ok(LoadStats {
        fetched: bars.len(),
        inserted,
        indicators,
    })
}

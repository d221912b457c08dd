//! End-to-end pipeline scenarios against an in-memory store and a scripted
//! provider.

use avpipe_core::data::{ApiError, Fetched, MarketDataApi, OutputSize, RawSeries};
use avpipe_core::domain::{CompanyOverview, RunStatus};
use avpipe_core::store::Store;
use avpipe_runner::{export_history_csv, Pipeline, StdoutProgress};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

const CALL_TIME: Duration = Duration::from_millis(250);

/// Scripted provider. Every successful call reports `CALL_TIME` elapsed.
#[derive(Default)]
struct FakeApi {
    overviews: HashMap<String, CompanyOverview>,
    series: HashMap<String, RawSeries>,
    rate_limited_series: HashSet<String>,
    calls: Cell<usize>,
    sizes: RefCell<Vec<OutputSize>>,
}

impl FakeApi {
    fn with_symbol(mut self, symbol: &str, name: &str, bars: usize) -> Self {
        self.overviews.insert(
            symbol.to_string(),
            CompanyOverview {
                name: Some(name.to_string()),
                sector: Some("TECHNOLOGY".to_string()),
                market_cap: Some(3.0e12),
            },
        );
        self.series.insert(symbol.to_string(), series(0, bars));
        self
    }

    fn rate_limit_series(mut self, symbol: &str) -> Self {
        self.rate_limited_series.insert(symbol.to_string());
        self
    }
}

impl MarketDataApi for FakeApi {
    fn name(&self) -> &str {
        "fake"
    }

    fn fetch_overview(&self, symbol: &str) -> Result<Fetched<CompanyOverview>, ApiError> {
        self.calls.set(self.calls.get() + 1);
        Ok(Fetched {
            payload: self.overviews.get(symbol).cloned().unwrap_or_default(),
            elapsed: CALL_TIME,
        })
    }

    fn fetch_daily_series(
        &self,
        symbol: &str,
        size: OutputSize,
    ) -> Result<Fetched<RawSeries>, ApiError> {
        self.calls.set(self.calls.get() + 1);
        self.sizes.borrow_mut().push(size);
        if self.rate_limited_series.contains(symbol) {
            return Err(ApiError::Exhausted {
                attempts: 3,
                last: Box::new(ApiError::RateLimited("5 calls per minute".into())),
            });
        }
        match self.series.get(symbol) {
            Some(s) => Ok(Fetched {
                payload: s.clone(),
                elapsed: CALL_TIME,
            }),
            None => Err(ApiError::MissingSeries {
                symbol: symbol.to_string(),
            }),
        }
    }
}

fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset as i64)
}

/// `count` bars starting at `start` days after 2024-01-01, closes rising by 1.
fn series(start: usize, count: usize) -> RawSeries {
    let mut map = serde_json::Map::new();
    for i in start..start + count {
        let close = 100.0 + i as f64;
        map.insert(
            day(i).format("%Y-%m-%d").to_string(),
            json!({
                "1. open": format!("{:.4}", close - 0.5),
                "2. high": format!("{:.4}", close + 1.0),
                "3. low": format!("{:.4}", close - 1.0),
                "4. close": format!("{:.4}", close),
                "5. adjusted close": format!("{:.4}", close),
                "6. volume": "1000000",
            }),
        );
    }
    map
}

fn fresh_store() -> Store {
    let store = Store::open_in_memory().unwrap();
    store.init_schema().unwrap();
    store
}

#[test]
fn first_run_loads_five_bars() {
    let api = FakeApi::default().with_symbol("AAPL", "Apple Inc", 5);
    let mut pipeline = Pipeline::new(fresh_store(), api);

    let summary = pipeline.run(&["AAPL"]);
    assert!(summary.all_succeeded());
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.rows_fetched, 5);
    assert_eq!(outcome.rows_inserted, 5);
    assert_eq!(outcome.indicators_written, 5);
    assert_eq!(outcome.request_time, 0.5);

    let store = pipeline.store();
    let tickers = store.tickers().unwrap();
    assert_eq!(tickers.len(), 1);
    let ticker = &tickers[0];
    assert_eq!(ticker.symbol, "AAPL");
    assert_eq!(ticker.name.as_deref(), Some("Apple Inc"));
    assert_eq!(ticker.source, "AlphaVantage");

    let company = store.company_info(ticker.id).unwrap().unwrap();
    assert_eq!(company.sector.as_deref(), Some("TECHNOLOGY"));

    let prices = store.prices(ticker.id).unwrap();
    assert_eq!(prices.len(), 5);
    assert_eq!(prices[0].date, day(0));
    assert_eq!(prices[4].close, Decimal::from_str("104.0000").unwrap());
    assert_eq!(prices[0].volume, 1_000_000.0);

    let indicators = store.indicators(ticker.id).unwrap();
    assert_eq!(indicators.len(), 5);
    for row in &indicators {
        assert!(row.sma.is_none());
        assert!(row.rsi.is_none());
        assert!(row.ema.is_some());
    }
    assert_eq!(indicators[0].ema, Some(100.0));

    let logs = store.run_logs(Some("AAPL"), 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, RunStatus::Success);
    assert_eq!(logs[0].request_time, 0.5);
}

#[test]
fn rerun_without_new_dates_inserts_nothing_and_keeps_indicators() {
    let api = FakeApi::default().with_symbol("AAPL", "Apple Inc", 5);
    let mut pipeline = Pipeline::new(fresh_store(), api);

    pipeline.run(&["AAPL"]);
    let second = pipeline.run(&["AAPL"]);

    let outcome = &second.outcomes[0];
    assert!(outcome.is_success());
    assert_eq!(outcome.rows_fetched, 5);
    assert_eq!(outcome.rows_inserted, 0);
    assert_eq!(outcome.indicators_written, 5);

    let store = pipeline.store();
    let ticker = store.ticker("AAPL").unwrap().unwrap();
    assert_eq!(store.prices(ticker.id).unwrap().len(), 5);
    assert_eq!(store.indicators(ticker.id).unwrap().len(), 5);
    assert_eq!(store.tickers().unwrap().len(), 1);
    assert_eq!(store.run_logs(Some("AAPL"), 10).unwrap().len(), 2);
}

#[test]
fn new_dates_extend_history_and_indicators_cover_everything() {
    let api = FakeApi::default().with_symbol("AAPL", "Apple Inc", 10);
    let mut first = Pipeline::new(fresh_store(), api);
    first.run(&["AAPL"]);
    let store = first.into_store();

    // provider now returns a window overlapping the stored one by five days
    let mut api = FakeApi::default().with_symbol("AAPL", "Apple Inc", 0);
    api.series.insert("AAPL".to_string(), series(5, 15));
    let mut pipeline = Pipeline::new(store, api);
    let summary = pipeline.run(&["AAPL"]);

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.rows_fetched, 15);
    assert_eq!(outcome.rows_inserted, 10);
    assert_eq!(outcome.indicators_written, 20);

    let store = pipeline.store();
    let ticker = store.ticker("AAPL").unwrap().unwrap();
    let indicators = store.indicators(ticker.id).unwrap();
    assert_eq!(indicators.len(), 20);
    assert!(indicators[12].sma.is_none());
    // mean of closes 100..=113
    let sma = indicators[13].sma.unwrap();
    assert!((sma - 106.5).abs() < 1e-9);
    // strictly rising closes: average loss is zero, RSI undefined
    assert!(indicators.iter().all(|r| r.rsi.is_none()));
}

#[test]
fn series_failure_rolls_back_and_logs_overview_time() {
    let api = FakeApi::default().with_symbol("AAPL", "Apple Inc", 5);
    let mut pipeline = Pipeline::new(fresh_store(), api);
    pipeline.run(&["AAPL"]);
    let store = pipeline.into_store();

    // second run: overview changes, series is rate limited
    let mut api = FakeApi::default().with_symbol("AAPL", "Apple Renamed", 8);
    api.overviews.get_mut("AAPL").unwrap().sector = Some("RETAIL".into());
    let api = api.rate_limit_series("AAPL");
    let mut pipeline = Pipeline::new(store, api);
    let summary = pipeline.run(&["AAPL"]);

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.rows_inserted, 0);
    assert_eq!(outcome.request_time, 0.25);
    let reason = outcome.error.as_deref().unwrap();
    assert!(reason.contains("rate limited"), "{reason}");

    let store = pipeline.store();
    let ticker = store.ticker("AAPL").unwrap().unwrap();
    assert_eq!(store.prices(ticker.id).unwrap().len(), 5);
    assert_eq!(store.indicators(ticker.id).unwrap().len(), 5);
    let company = store.company_info(ticker.id).unwrap().unwrap();
    assert_eq!(company.sector.as_deref(), Some("TECHNOLOGY"));
    assert_eq!(company.name.as_deref(), Some("Apple Inc"));

    let logs = store.run_logs(Some("AAPL"), 10).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].status, RunStatus::Failed);
    assert_eq!(logs[0].request_time, 0.25);
    assert_eq!(logs[1].status, RunStatus::Success);
}

#[test]
fn failure_of_one_ticker_does_not_affect_others() {
    let api = FakeApi::default()
        .with_symbol("AAPL", "Apple Inc", 5)
        .with_symbol("MSFT", "Microsoft", 3)
        .with_symbol("BAD", "Bad Corp", 4)
        .rate_limit_series("BAD");
    let mut pipeline = Pipeline::new(fresh_store(), api);

    let mut out = StdoutProgress::with_writer(Vec::new());
    let summary = pipeline.run_with_progress(&["AAPL", "BAD", "MSFT"], &mut out);

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    let symbols: Vec<_> = summary.outcomes.iter().map(|o| o.symbol.as_str()).collect();
    assert_eq!(symbols, ["AAPL", "BAD", "MSFT"]);

    let store = pipeline.store();
    // the failed ticker's row was created inside the rolled-back transaction
    assert!(store.ticker("BAD").unwrap().is_none());
    let msft = store.ticker("MSFT").unwrap().unwrap();
    assert_eq!(store.prices(msft.id).unwrap().len(), 3);

    let logs = store.run_logs(None, 10).unwrap();
    assert_eq!(logs.len(), 3);
    let bad_log = logs.iter().find(|l| l.symbol == "BAD").unwrap();
    assert_eq!(bad_log.status, RunStatus::Failed);

    let text = String::from_utf8(out.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "[OK] Loaded AAPL (5 rows)");
    assert!(lines[1].starts_with("[ERROR] BAD: "));
    assert_eq!(lines[2], "[OK] Loaded MSFT (3 rows)");
}

#[test]
fn missing_series_key_fails_the_ticker() {
    let mut api = FakeApi::default().with_symbol("IBM", "IBM", 3);
    api.series.remove("IBM");
    let mut pipeline = Pipeline::new(fresh_store(), api);

    let summary = pipeline.run(&["IBM"]);
    let outcome = &summary.outcomes[0];
    assert!(!outcome.is_success());
    assert!(outcome.error.as_deref().unwrap().contains("IBM"));
    assert!(pipeline.store().ticker("IBM").unwrap().is_none());
}

#[test]
fn malformed_bar_fails_the_ticker() {
    let mut api = FakeApi::default().with_symbol("IBM", "IBM", 3);
    let mut bad = series(0, 3);
    bad.insert(
        "2024-02-01".to_string(),
        json!({"1. open": "abc", "2. high": "1", "3. low": "1", "4. close": "1", "6. volume": "1"}),
    );
    api.series.insert("IBM".to_string(), bad);
    let mut pipeline = Pipeline::new(fresh_store(), api);

    let summary = pipeline.run(&["IBM"]);
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().starts_with("transform failed"));
    // both calls were made before the transform failed
    assert_eq!(outcome.request_time, 0.5);
}

#[test]
fn symbols_are_normalized() {
    let api = FakeApi::default().with_symbol("NVDA", "NVIDIA", 2);
    let mut pipeline = Pipeline::new(fresh_store(), api);

    let summary = pipeline.run(&[" nvda "]);
    assert!(summary.all_succeeded());
    assert_eq!(summary.outcomes[0].symbol, "NVDA");
    assert!(pipeline.store().ticker("NVDA").unwrap().is_some());
}

#[test]
fn empty_symbol_fails_without_provider_calls() {
    let mut pipeline = Pipeline::new(fresh_store(), FakeApi::default());
    let summary = pipeline.run(&["   "]);
    assert_eq!(summary.failed(), 1);
    assert_eq!(pipeline.store().run_logs(None, 10).unwrap().len(), 1);
}

#[test]
fn output_size_is_passed_to_provider() {
    let api = FakeApi::default().with_symbol("AMD", "AMD", 2);
    let mut pipeline = Pipeline::new(fresh_store(), api).with_output_size(OutputSize::Full);
    pipeline.run(&["AMD", "AMD"]);
    assert_eq!(*pipeline.api().sizes.borrow(), vec![OutputSize::Full, OutputSize::Full]);
    assert_eq!(pipeline.api().calls.get(), 4);
}

#[test]
fn company_fields_survive_sparse_overview() {
    let api = FakeApi::default().with_symbol("JPM", "JPMorgan Chase", 2);
    let mut pipeline = Pipeline::new(fresh_store(), api);
    pipeline.run(&["JPM"]);
    let store = pipeline.into_store();

    let mut api = FakeApi::default().with_symbol("JPM", "JPMorgan Chase & Co", 2);
    *api.overviews.get_mut("JPM").unwrap() = CompanyOverview {
        name: Some("JPMorgan Chase & Co".into()),
        sector: None,
        market_cap: None,
    };
    let mut pipeline = Pipeline::new(store, api);
    assert!(pipeline.run(&["JPM"]).all_succeeded());

    let store = pipeline.store();
    let ticker = store.ticker("JPM").unwrap().unwrap();
    // the display name is only backfilled once
    assert_eq!(ticker.name.as_deref(), Some("JPMorgan Chase"));
    let company = store.company_info(ticker.id).unwrap().unwrap();
    assert_eq!(company.name.as_deref(), Some("JPMorgan Chase & Co"));
    assert_eq!(company.sector.as_deref(), Some("TECHNOLOGY"));
    assert_eq!(company.market_cap, Some(3.0e12));
}

#[test]
fn export_writes_joined_rows() {
    let api = FakeApi::default().with_symbol("AAPL", "Apple Inc", 15);
    let mut pipeline = Pipeline::new(fresh_store(), api);
    pipeline.run(&["AAPL"]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aapl.csv");
    let file = std::fs::File::create(&path).unwrap();
    let written = export_history_csv(pipeline.store(), "aapl", file).unwrap();
    assert_eq!(written, 15);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 16);
    assert_eq!(lines[0], "date,symbol,open,high,low,close,volume,rsi,sma,ema");
    assert!(lines[1].starts_with("2024-01-01,AAPL,99.5000,101.0000,99.0000,100.0000,1000000,,,"));
    // SMA is defined from the 14th row on
    let cols: Vec<&str> = lines[14].split(',').collect();
    assert!(!cols[8].is_empty());
}

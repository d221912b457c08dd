//! SQLite schema.
//!
//! Dates are stored as `YYYY-MM-DD` text and prices as decimal text so that
//! no OHLC value ever passes through floating point. Every table keyed on a
//! ticker cascades on ticker deletion; `api_logs` is independent.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tickers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE,
    name TEXT,
    source TEXT NOT NULL DEFAULT 'AlphaVantage',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS company_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL UNIQUE REFERENCES tickers(id) ON DELETE CASCADE,
    name TEXT,
    sector TEXT,
    market_cap REAL
);

CREATE TABLE IF NOT EXISTS price_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL REFERENCES tickers(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    open TEXT NOT NULL,
    high TEXT NOT NULL,
    low TEXT NOT NULL,
    close TEXT NOT NULL,
    volume REAL NOT NULL,
    UNIQUE (ticker_id, date)
);

CREATE TABLE IF NOT EXISTS technical_indicators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL REFERENCES tickers(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    rsi REAL,
    sma REAL,
    ema REAL,
    UNIQUE (ticker_id, date)
);

CREATE TABLE IF NOT EXISTS api_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    ticker TEXT NOT NULL,
    api_status TEXT NOT NULL,
    request_time REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_ticker ON price_data(ticker_id);
CREATE INDEX IF NOT EXISTS idx_indicator_ticker ON technical_indicators(ticker_id);
CREATE INDEX IF NOT EXISTS idx_api_logs_ticker ON api_logs(ticker);
"#;

//! SQLite persistence for tickers, company info, prices, indicators and the
//! run audit log.
//!
//! All per-ticker writes go through a [`StoreTx`], which wraps a rusqlite
//! transaction: dropping it without [`StoreTx::commit`] rolls every pending
//! write back. Audit rows are written outside any ticker transaction.

pub mod schema;

use crate::domain::{
    request_seconds, ClosePoint, CompanyInfo, CompanyOverview, IndicatorDatum, PriceDatum,
    RunLogEntry, RunStatus, Ticker, TickerId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt {column} value '{value}'")]
    Corrupt { column: &'static str, value: String },

    #[error("unsupported database url '{0}' (expected a file path or sqlite:// url)")]
    UnsupportedUrl(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Where a database lives, parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts a plain path, `sqlite://path` / `sqlite:///path` urls, or `:memory:`.
    ///
    /// `sqlite://data.db` and `sqlite:///data.db` are the relative path
    /// `data.db`; `sqlite:////var/data.db` is the absolute path `/var/data.db`.
    /// A bare `sqlite://` is in-memory.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url == ":memory:" || url == "sqlite://" || url == "sqlite:///:memory:" {
            return Ok(DatabaseLocation::Memory);
        }
        if let Some(path) = url
            .strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
        {
            return Ok(DatabaseLocation::File(PathBuf::from(path)));
        }
        if url.contains("://") || url.is_empty() {
            return Err(StoreError::UnsupportedUrl(url.to_string()));
        }
        Ok(DatabaseLocation::File(PathBuf::from(url)))
    }
}

/// Per-ticker row counts for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerStats {
    pub symbol: String,
    pub name: Option<String>,
    pub price_rows: usize,
    pub indicator_rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// A joined price + indicator row for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub price: PriceDatum,
    pub indicators: Option<IndicatorDatum>,
}

/// SQLite database handle.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::configure(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    /// Open from a connection string; see [`DatabaseLocation::parse`].
    pub fn from_url(url: &str) -> Result<Self> {
        match DatabaseLocation::parse(url)? {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => Self::open(path),
        }
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Create tables and indexes if they do not exist.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(())
    }

    /// Start the transaction for one ticker run.
    pub fn begin(&mut self) -> Result<StoreTx<'_>> {
        Ok(StoreTx {
            tx: self.conn.transaction()?,
        })
    }

    /// Append an audit row. Commits on its own.
    pub fn append_run_log(&self, symbol: &str, status: RunStatus, elapsed: Duration) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO api_logs (created_at, ticker, api_status, request_time) VALUES (?1, ?2, ?3, ?4)",
            params![
                Utc::now().to_rfc3339(),
                symbol,
                status.as_str(),
                request_seconds(elapsed)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Audit rows, newest first, optionally for one symbol.
    pub fn run_logs(&self, symbol: Option<&str>, limit: usize) -> Result<Vec<RunLogEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, ticker, api_status, request_time, created_at
            FROM api_logs
            WHERE ?1 IS NULL OR ticker = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )?;

        let raw = stmt
            .query_map(params![symbol, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(id, symbol, status, request_time, created_at)| {
                Ok(RunLogEntry {
                    id,
                    symbol,
                    status: RunStatus::from_str(&status).map_err(|_| StoreError::Corrupt {
                        column: "api_status",
                        value: status.clone(),
                    })?,
                    request_time,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    pub fn ticker(&self, symbol: &str) -> Result<Option<Ticker>> {
        query_ticker(&self.conn, symbol)
    }

    /// All tickers ordered by symbol.
    pub fn tickers(&self) -> Result<Vec<Ticker>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, symbol, name, source, created_at FROM tickers ORDER BY symbol")?;
        let raw = stmt
            .query_map([], raw_ticker)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(RawTicker::into_ticker).collect()
    }

    pub fn company_info(&self, ticker_id: TickerId) -> Result<Option<CompanyInfo>> {
        query_company(&self.conn, ticker_id)
    }

    /// Stored bars for a ticker, ascending by date.
    pub fn prices(&self, ticker_id: TickerId) -> Result<Vec<PriceDatum>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, open, high, low, close, volume
            FROM price_data
            WHERE ticker_id = ?1
            ORDER BY date ASC
            "#,
        )?;

        let raw = stmt
            .query_map(params![ticker_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(date, open, high, low, close, volume)| {
                Ok(PriceDatum {
                    ticker_id,
                    date: parse_date(&date)?,
                    open: parse_decimal("open", &open)?,
                    high: parse_decimal("high", &high)?,
                    low: parse_decimal("low", &low)?,
                    close: parse_decimal("close", &close)?,
                    volume,
                })
            })
            .collect()
    }

    /// Stored indicator rows for a ticker, ascending by date.
    pub fn indicators(&self, ticker_id: TickerId) -> Result<Vec<IndicatorDatum>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, rsi, sma, ema
            FROM technical_indicators
            WHERE ticker_id = ?1
            ORDER BY date ASC
            "#,
        )?;

        let raw = stmt
            .query_map(params![ticker_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(date, rsi, sma, ema)| {
                Ok(IndicatorDatum {
                    ticker_id,
                    date: parse_date(&date)?,
                    rsi,
                    sma,
                    ema,
                })
            })
            .collect()
    }

    /// Prices joined with the indicator row for the same date.
    pub fn history(&self, ticker_id: TickerId) -> Result<Vec<HistoryRow>> {
        let prices = self.prices(ticker_id)?;
        let mut indicators = self.indicators(ticker_id)?.into_iter().peekable();

        let mut rows = Vec::with_capacity(prices.len());
        for price in prices {
            while indicators.peek().is_some_and(|ind| ind.date < price.date) {
                indicators.next();
            }
            let matched = indicators.next_if(|ind| ind.date == price.date);
            rows.push(HistoryRow {
                price,
                indicators: matched,
            });
        }
        Ok(rows)
    }

    /// Row counts and date range per ticker, ordered by symbol.
    pub fn ticker_stats(&self) -> Result<Vec<TickerStats>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.symbol, t.name,
                   (SELECT COUNT(*) FROM price_data p WHERE p.ticker_id = t.id),
                   (SELECT COUNT(*) FROM technical_indicators i WHERE i.ticker_id = t.id),
                   (SELECT MIN(date) FROM price_data p WHERE p.ticker_id = t.id),
                   (SELECT MAX(date) FROM price_data p WHERE p.ticker_id = t.id)
            FROM tickers t
            ORDER BY t.symbol
            "#,
        )?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(symbol, name, prices, indicators, first, last)| {
                Ok(TickerStats {
                    symbol,
                    name,
                    price_rows: prices as usize,
                    indicator_rows: indicators as usize,
                    first_date: first.as_deref().map(parse_date).transpose()?,
                    last_date: last.as_deref().map(parse_date).transpose()?,
                })
            })
            .collect()
    }

    /// Delete a ticker; company, price and indicator rows cascade.
    ///
    /// Returns false if the symbol was not stored.
    pub fn delete_ticker(&self, symbol: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM tickers WHERE symbol = ?1", params![symbol])?;
        Ok(deleted > 0)
    }
}

/// Pending writes for one ticker run.
pub struct StoreTx<'a> {
    tx: Transaction<'a>,
}

impl StoreTx<'_> {
    /// Look up a ticker by symbol, inserting it on first encounter.
    pub fn get_or_create_ticker(&self, symbol: &str, source: &str) -> Result<Ticker> {
        if let Some(ticker) = query_ticker(&self.tx, symbol)? {
            return Ok(ticker);
        }

        let created_at = Utc::now();
        self.tx.execute(
            "INSERT INTO tickers (symbol, name, source, created_at) VALUES (?1, NULL, ?2, ?3)",
            params![symbol, source, created_at.to_rfc3339()],
        )?;

        Ok(Ticker {
            id: self.tx.last_insert_rowid(),
            symbol: symbol.to_string(),
            name: None,
            source: source.to_string(),
            created_at,
        })
    }

    /// Insert or merge company info, and backfill the ticker's display name.
    pub fn upsert_company_info(
        &self,
        ticker: &mut Ticker,
        overview: &CompanyOverview,
    ) -> Result<CompanyInfo> {
        if ticker.name.is_none() {
            if let Some(name) = &overview.name {
                self.tx.execute(
                    "UPDATE tickers SET name = ?1 WHERE id = ?2",
                    params![name, ticker.id],
                )?;
                ticker.name = Some(name.clone());
            }
        }

        match query_company(&self.tx, ticker.id)? {
            Some(mut info) => {
                info.merge(overview);
                self.tx.execute(
                    "UPDATE company_info SET name = ?1, sector = ?2, market_cap = ?3 WHERE ticker_id = ?4",
                    params![info.name, info.sector, info.market_cap, ticker.id],
                )?;
                Ok(info)
            }
            None => {
                let info = CompanyInfo::from_overview(ticker.id, overview);
                self.tx.execute(
                    "INSERT INTO company_info (ticker_id, name, sector, market_cap) VALUES (?1, ?2, ?3, ?4)",
                    params![ticker.id, info.name, info.sector, info.market_cap],
                )?;
                Ok(info)
            }
        }
    }

    /// Dates already stored for a ticker.
    pub fn existing_price_dates(&self, ticker_id: TickerId) -> Result<BTreeSet<NaiveDate>> {
        let mut stmt = self
            .tx
            .prepare("SELECT date FROM price_data WHERE ticker_id = ?1")?;
        let raw = stmt
            .query_map(params![ticker_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.iter().map(|d| parse_date(d)).collect()
    }

    /// Bulk insert bars. A date that already exists violates the unique
    /// constraint and fails the whole insert.
    pub fn insert_prices(&self, rows: &[PriceDatum]) -> Result<usize> {
        let mut stmt = self.tx.prepare(
            r#"
            INSERT INTO price_data (ticker_id, date, open, high, low, close, volume)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?;

        for row in rows {
            stmt.execute(params![
                row.ticker_id,
                row.date.to_string(),
                row.open.to_string(),
                row.high.to_string(),
                row.low.to_string(),
                row.close.to_string(),
                row.volume,
            ])?;
        }
        Ok(rows.len())
    }

    /// Full close history for a ticker, ascending by date, as f64.
    pub fn close_history(&self, ticker_id: TickerId) -> Result<Vec<ClosePoint>> {
        let mut stmt = self.tx.prepare(
            "SELECT date, close FROM price_data WHERE ticker_id = ?1 ORDER BY date ASC",
        )?;
        let raw = stmt
            .query_map(params![ticker_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(date, close)| {
                let close = parse_decimal("close", &close)?;
                Ok(ClosePoint {
                    date: parse_date(&date)?,
                    close: close.to_f64().ok_or_else(|| StoreError::Corrupt {
                        column: "close",
                        value: close.to_string(),
                    })?,
                })
            })
            .collect()
    }

    /// Delete every indicator row for a ticker and insert `rows` instead.
    pub fn replace_indicators(&self, ticker_id: TickerId, rows: &[IndicatorDatum]) -> Result<usize> {
        self.tx.execute(
            "DELETE FROM technical_indicators WHERE ticker_id = ?1",
            params![ticker_id],
        )?;

        let mut stmt = self.tx.prepare(
            r#"
            INSERT INTO technical_indicators (ticker_id, date, rsi, sma, ema)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for row in rows {
            stmt.execute(params![
                ticker_id,
                row.date.to_string(),
                row.rsi,
                row.sma,
                row.ema
            ])?;
        }
        Ok(rows.len())
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

struct RawTicker {
    id: i64,
    symbol: String,
    name: Option<String>,
    source: String,
    created_at: String,
}

impl RawTicker {
    fn into_ticker(self) -> Result<Ticker> {
        Ok(Ticker {
            id: self.id,
            symbol: self.symbol,
            name: self.name,
            source: self.source,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn raw_ticker(row: &rusqlite::Row) -> rusqlite::Result<RawTicker> {
    Ok(RawTicker {
        id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        source: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_ticker(conn: &Connection, symbol: &str) -> Result<Option<Ticker>> {
    conn.query_row(
        "SELECT id, symbol, name, source, created_at FROM tickers WHERE symbol = ?1",
        params![symbol],
        raw_ticker,
    )
    .optional()?
    .map(RawTicker::into_ticker)
    .transpose()
}

fn query_company(conn: &Connection, ticker_id: TickerId) -> Result<Option<CompanyInfo>> {
    Ok(conn
        .query_row(
            "SELECT name, sector, market_cap FROM company_info WHERE ticker_id = ?1",
            params![ticker_id],
            |row| {
                Ok(CompanyInfo {
                    ticker_id,
                    name: row.get(0)?,
                    sector: row.get(1)?,
                    market_cap: row.get(2)?,
                })
            },
        )
        .optional()?)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StoreError::Corrupt {
        column: "date",
        value: s.to_string(),
    })
}

fn parse_decimal(column: &'static str, s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|_| StoreError::Corrupt {
        column,
        value: s.to_string(),
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            column: "created_at",
            value: s.to_string(),
        })
}

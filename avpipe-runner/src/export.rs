//! CSV export of stored history.
//!
//! Columns: date, symbol, open, high, low, close, volume, rsi, sma, ema.
//! Prices keep their stored decimal text; undefined indicators are empty.

use anyhow::{Context, Result};
use avpipe_core::domain::normalize_symbol;
use avpipe_core::store::Store;
use std::io::Write;

const HEADER: [&str; 10] = [
    "date", "symbol", "open", "high", "low", "close", "volume", "rsi", "sma", "ema",
];

/// Write one row per stored date for `symbol`. Returns the number of data rows.
pub fn export_history_csv<W: Write>(store: &Store, symbol: &str, out: W) -> Result<usize> {
    let symbol = normalize_symbol(symbol);
    let ticker = store
        .ticker(&symbol)?
        .with_context(|| format!("ticker {symbol} is not in the database"))?;
    let rows = store
        .history(ticker.id)
        .with_context(|| format!("failed to read history for {symbol}"))?;

    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(HEADER)?;

    for row in &rows {
        let p = &row.price;
        let (rsi, sma, ema) = match &row.indicators {
            Some(ind) => (ind.rsi, ind.sma, ind.ema),
            None => (None, None, None),
        };
        wtr.write_record([
            p.date.format("%Y-%m-%d").to_string(),
            symbol.clone(),
            p.open.to_string(),
            p.high.to_string(),
            p.low.to_string(),
            p.close.to_string(),
            format!("{}", p.volume),
            opt(rsi),
            opt(sma),
            opt(ema),
        ])?;
    }
    wtr.flush().context("failed to flush CSV output")?;
    Ok(rows.len())
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

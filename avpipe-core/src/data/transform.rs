//! Provider payload → typed domain values.

use super::provider::RawSeries;
use crate::domain::{CompanyOverview, PriceBar};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const OPEN: &str = "1. open";
const HIGH: &str = "2. high";
const LOW: &str = "3. low";
const CLOSE: &str = "4. close";
const VOLUME: &str = "6. volume";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("{date}: missing field '{field}'")]
    MissingField { date: String, field: &'static str },

    #[error("{date}: invalid {field} value '{value}'")]
    InvalidNumber {
        date: String,
        field: &'static str,
        value: String,
    },
}

/// Convert a daily series section into bars sorted ascending by date.
///
/// One bar per date key. OHLC are parsed as exact decimals, volume as f64.
pub fn parse_daily_series(series: &RawSeries) -> Result<Vec<PriceBar>, TransformError> {
    let mut bars = Vec::with_capacity(series.len());

    for (date_str, fields) in series {
        let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT)
            .map_err(|_| TransformError::InvalidDate(date_str.clone()))?;

        let text = |field: &'static str| -> Result<String, TransformError> {
            fields
                .get(field)
                .and_then(scalar_text)
                .ok_or_else(|| TransformError::MissingField {
                    date: date_str.clone(),
                    field,
                })
        };
        let decimal = |field: &'static str| -> Result<Decimal, TransformError> {
            let raw = text(field)?;
            Decimal::from_str(raw.trim()).map_err(|_| TransformError::InvalidNumber {
                date: date_str.clone(),
                field,
                value: raw,
            })
        };

        let raw_volume = text(VOLUME)?;
        let volume = raw_volume
            .trim()
            .parse::<f64>()
            .map_err(|_| TransformError::InvalidNumber {
                date: date_str.clone(),
                field: VOLUME,
                value: raw_volume.clone(),
            })?;

        let bar = PriceBar {
            date,
            open: decimal(OPEN)?,
            high: decimal(HIGH)?,
            low: decimal(LOW)?,
            close: decimal(CLOSE)?,
            volume,
        };
        // Stored as delivered; the provider occasionally reports odd ranges.
        if !bar.is_sane() {
            warn!(date = %date_str, high = %bar.high, low = %bar.low, "inconsistent OHLC bar");
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

/// Extract company fields from an overview payload.
///
/// Missing keys, empty strings and the provider's `"None"` placeholder all
/// become `None`; so does a market capitalization that is not a number.
pub fn parse_overview(payload: &Map<String, Value>) -> CompanyOverview {
    let field = |key: &str| payload.get(key).and_then(scalar_text).filter(|s| is_present(s));

    CompanyOverview {
        name: field("Name"),
        sector: field("Sector"),
        market_cap: field("MarketCapitalization").and_then(|s| s.trim().parse::<f64>().ok()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_present(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s != "None" && s != "-"
}

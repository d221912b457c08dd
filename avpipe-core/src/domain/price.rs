//! Daily price bars.
//!
//! OHLC values are exact decimals; volume is a float. Prices are never
//! converted to floating point here, only derived indicator inputs are.

use super::TickerId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A typed daily bar produced from a provider payload, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: f64,
}

/// A stored daily bar, unique per (ticker, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDatum {
    pub ticker_id: TickerId,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: f64,
}

impl PriceBar {
    /// Attach the bar to a ticker.
    pub fn into_datum(self, ticker_id: TickerId) -> PriceDatum {
        PriceDatum {
            ticker_id,
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }

    /// Basic sanity check: high is the top of the range and low the bottom.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }
}

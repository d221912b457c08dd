//! Indicator inputs and outputs.

use super::TickerId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One closing price fed to the indicator calculator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Indicator values for one date. `None` until the window has enough history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub rsi: Option<f64>,
    pub sma: Option<f64>,
    pub ema: Option<f64>,
}

/// A stored indicator row, unique per (ticker, date).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDatum {
    pub ticker_id: TickerId,
    pub date: NaiveDate,
    pub rsi: Option<f64>,
    pub sma: Option<f64>,
    pub ema: Option<f64>,
}

impl IndicatorPoint {
    pub fn into_datum(self, ticker_id: TickerId) -> IndicatorDatum {
        IndicatorDatum {
            ticker_id,
            date: self.date,
            rsi: self.rsi,
            sma: self.sma,
            ema: self.ema,
        }
    }
}

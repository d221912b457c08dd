//! Technical indicators over a closing-price series.
//!
//! Each indicator is a pure function: closes in, a series of the same length
//! out, with `f64::NAN` marking values that are undefined because the window
//! has not filled yet. [`calculate_indicators`] bundles the three indicators
//! the pipeline stores and maps NaN to `None`.

pub mod ema;
pub mod rsi;
pub mod sma;

pub use ema::Ema;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::{ClosePoint, IndicatorPoint};

/// Window used for every stored indicator.
pub const DEFAULT_WINDOW: usize = 14;

/// Trait for indicators computed over a full close series.
///
/// No output value at index t may depend on closes after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g. "sma_14").
    fn name(&self) -> &str;

    /// Number of leading values that are undefined.
    fn lookback(&self) -> usize;

    /// Compute the indicator. Returns a `Vec<f64>` the same length as `closes`.
    fn compute(&self, closes: &[f64]) -> Vec<f64>;
}

/// Compute RSI/SMA/EMA for a price history, one record per input date.
///
/// Input order does not matter; output is sorted ascending by date.
pub fn calculate_indicators(points: &[ClosePoint]) -> Vec<IndicatorPoint> {
    calculate_with_window(points, DEFAULT_WINDOW)
}

/// [`calculate_indicators`] with a custom window.
pub fn calculate_with_window(points: &[ClosePoint], window: usize) -> Vec<IndicatorPoint> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.date);
    let closes: Vec<f64> = sorted.iter().map(|p| p.close).collect();

    let rsi = Rsi::new(window).compute(&closes);
    let sma = Sma::new(window).compute(&closes);
    let ema = Ema::new(window).compute(&closes);

    sorted
        .iter()
        .enumerate()
        .map(|(i, p)| IndicatorPoint {
            date: p.date,
            rsi: defined(rsi[i]),
            sma: defined(sma[i]),
            ema: defined(ema[i]),
        })
        .collect()
}

fn defined(v: f64) -> Option<f64> {
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn points(closes: &[f64]) -> Vec<ClosePoint> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| ClosePoint {
                date: base + chrono::Duration::days(i as i64),
                close,
            })
            .collect()
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(calculate_indicators(&[]).is_empty());
    }

    #[test]
    fn output_is_sorted_even_when_input_is_not() {
        let mut input = points(&[10.0, 11.0, 12.0, 13.0]);
        input.reverse();
        let out = calculate_indicators(&input);
        assert_eq!(out.len(), 4);
        for pair in out.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
        // EMA seeds from the earliest close, not the first element given.
        assert_approx(out[0].ema.unwrap(), 10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn short_series_has_only_ema() {
        let out = calculate_indicators(&points(&[100.0, 101.5, 99.0, 102.0, 103.25]));
        assert_eq!(out.len(), 5);
        for row in &out {
            assert!(row.sma.is_none());
            assert!(row.rsi.is_none());
            assert!(row.ema.is_some());
        }
    }

    #[test]
    fn sma_defined_from_window_end() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let out = calculate_indicators(&points(&closes));
        assert!(out[12].sma.is_none());
        assert_approx(out[13].sma.unwrap(), 7.5, DEFAULT_EPSILON);
        assert_approx(out[19].sma.unwrap(), 13.5, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_needs_a_full_window_of_changes() {
        let closes: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let out = calculate_indicators(&points(&closes));
        assert!(out[13].rsi.is_none());
        // Seven gains and seven losses of equal size.
        assert_approx(out[14].rsi.unwrap(), 50.0, 1e-9);
    }
}

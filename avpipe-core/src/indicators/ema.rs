//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1],
//! alpha = 2 / (period + 1).
//! Seed: EMA[0] = close[0], with no warm-up bias correction, so the series is
//! defined from the first close. Lookback: 0.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let alpha = self.alpha();
        let mut result = Vec::with_capacity(closes.len());
        let mut prev: Option<f64> = None;

        for &close in closes {
            let ema = match prev {
                None => close,
                Some(p) => alpha * close + (1.0 - alpha) * p,
            };
            result.push(ema);
            prev = Some(ema);
        }

        result
    }
}

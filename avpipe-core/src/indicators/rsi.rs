//! Relative Strength Index (RSI).
//!
//! gain = max(delta, 0), loss = max(-delta, 0), each averaged with a simple
//! rolling mean over `period` deltas (not Wilder smoothing).
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! The first delta is undefined, so lookback is `period`.
//! Edge case: avg_loss == 0 → undefined (NaN), including the all-gains case.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period + 1 {
            return result;
        }

        // gains[i] / losses[i] describe the move from close[i] to close[i+1]
        let (gains, losses): (Vec<f64>, Vec<f64>) = closes
            .windows(2)
            .map(|w| {
                let delta = w[1] - w[0];
                (delta.max(0.0), (-delta).max(0.0))
            })
            .unzip();

        for i in self.period..n {
            // Summed per window so an all-gain window yields an exact zero loss.
            let window = (i - self.period)..i;
            let avg_gain = gains[window.clone()].iter().sum::<f64>() / self.period as f64;
            let avg_loss = losses[window].iter().sum::<f64>() / self.period as f64;
            result[i] = compute_rsi(avg_gain, avg_loss);
        }

        result
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        f64::NAN
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

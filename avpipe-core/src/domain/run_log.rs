//! Audit records, one per ticker run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Outcome of a single ticker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// Append-only audit row.
///
/// `symbol` is plain text rather than a ticker reference, so log rows survive
/// ticker removal and failed runs that never created a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: i64,
    pub symbol: String,
    pub status: RunStatus,
    /// Cumulative seconds spent in external calls.
    pub request_time: f64,
    pub created_at: DateTime<Utc>,
}

/// Seconds rounded to four decimals, the precision audit rows are stored at.
pub fn request_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_text() {
        for status in [RunStatus::Success, RunStatus::Failed] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("OK".parse::<RunStatus>().is_err());
    }

    #[test]
    fn request_seconds_rounds_to_four_places() {
        assert_eq!(request_seconds(Duration::from_micros(1_234_567)), 1.2346);
        assert_eq!(request_seconds(Duration::ZERO), 0.0);
    }
}

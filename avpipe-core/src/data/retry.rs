//! Retry policy for provider requests.
//!
//! Linear backoff: after failed attempt `n` (1-based) the client sleeps
//! `backoff * n`, including after the final attempt. No jitter.

use super::provider::ApiError;
use std::time::Duration;

/// How many times to try a request and how long to wait between tries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Base delay, multiplied by the attempt number.
    pub backoff: Duration,
    /// Whether `"Error Message"` responses are retried like rate-limit notes.
    pub retry_error_messages: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(1500),
            retry_error_messages: false,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Whether a failed attempt may be retried.
    pub fn is_retryable(&self, err: &ApiError) -> bool {
        match err {
            ApiError::Transport(_) | ApiError::RateLimited(_) | ApiError::Malformed(_) => true,
            ApiError::Provider(_) => self.retry_error_messages,
            ApiError::MissingSeries { .. } | ApiError::Exhausted { .. } => false,
        }
    }
}

/// Blocks the current thread between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

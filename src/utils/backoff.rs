//! Exponential backoff for retrying transient accept failures.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Calculate exponential backoff delay for a given attempt number.
///
/// # Arguments
///
/// * `attempt` - Current attempt number (0-indexed)
/// * `base_delay_ms` - Base delay in milliseconds for the first retry
/// * `max_delay_ms` - Maximum delay cap in milliseconds
///
/// # Example
///
/// ```
/// use secure_proxy::utils::backoff::exponential_backoff;
/// use std::time::Duration;
///
/// assert_eq!(exponential_backoff(0, 5, 1000), Duration::from_millis(5));
/// assert_eq!(exponential_backoff(3, 5, 1000), Duration::from_millis(40));
/// ```
pub fn exponential_backoff(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let delay_ms = base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt.min(10))) // 2^attempt with cap at 2^10
        .min(max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Thread-safe exponential backoff counter.
///
/// Each call to [`next_delay`](Self::next_delay) doubles the delay until the
/// cap is reached; [`reset`](Self::reset) starts over after a success.
#[derive(Debug)]
pub struct BackoffCounter {
    counter: AtomicU32,
}

impl Default for BackoffCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffCounter {
    /// Create a new backoff counter with zero attempts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }

    /// Get the next delay duration and increment the attempt counter.
    pub fn next_delay(&self, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
        let attempt = self.counter.fetch_add(1, Ordering::Relaxed);
        exponential_backoff(attempt, base_delay_ms, max_delay_ms)
    }

    /// Forget previous failures
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    /// Number of consecutive failures recorded since the last reset
    pub fn attempts(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

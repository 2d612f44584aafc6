//! Backoff policy: decides retry delays.

use std::time::Duration;

/// Exponential backoff, doubling from `base_ms` and capped at `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_ms: i64,

    /// Upper bound for any single delay.
    pub max_ms: i64,
}

impl BackoffPolicy {
    pub fn new(base_ms: i64, max_ms: i64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Delay before retry number `retry` (1-indexed).
    ///
    /// delay = min(base_ms * 2^(retry - 1), max_ms)
    ///
    /// The delay is derived from the retry number alone, never from the
    /// previous delay. Example with base=100ms, max=1s:
    /// - retry 1: 100ms
    /// - retry 2: 200ms
    /// - retry 3: 400ms
    /// - retry 5: 1s (1600ms capped)
    pub fn delay_ms(&self, retry: u32) -> i64 {
        let exp = retry.saturating_sub(1);
        let factor = 2i64.checked_pow(exp).unwrap_or(i64::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }

    pub fn delay(&self, retry: u32) -> Duration {
        Duration::from_millis(self.delay_ms(retry).max(0) as u64)
    }
}

use std::time::Duration;

/// Maximum number of retry attempts for failed API requests
pub const MAX_RETRIES: u32 = 3;

/// Exponential backoff settings for Datadog API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry_count` (1-based): base * 2^retry_count
    ///
    /// With the default one-second base:
    /// - Retry 1: 2 seconds
    /// - Retry 2: 4 seconds
    /// - Retry 3: 8 seconds
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(retry_count))
    }

    /// Check if another retry should be attempted
    pub fn should_retry(&self, current_retry: u32) -> bool {
        current_retry < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES, Duration::from_secs(1))
    }
}

//! Retry classification and backoff
//!
//! Transient and server-side failures (5xx, 429, 408) are retried; every other
//! status is terminal. Redelivery delays grow as `2^attempt` time units up to a cap.

use std::time::Duration;

/// Attempt ceiling after which a task is given up on.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;

/// Backoff cap in seconds (10 minutes).
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 600;

/// Decide whether a task that answered `status` on its `attempt`-th try
/// (1-based) should be tried again.
pub fn should_retry(status: u16, attempt: u32, max_attempts: u32) -> bool {
    if attempt > max_attempts {
        return false;
    }

    status >= 500 || status == 429 || status == 408
}

/// Capped exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Length of one backoff step; one second in production
    pub unit: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            cap: Duration::from_secs(DEFAULT_BACKOFF_CAP_SECS),
        }
    }
}

impl BackoffPolicy {
    pub fn new(unit: Duration, cap: Duration) -> Self {
        Self { unit, cap }
    }

    /// `min(2^attempt * unit, cap)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.unit.saturating_mul(factor).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(should_retry(500, 1, DEFAULT_MAX_ATTEMPTS));
        assert!(should_retry(503, 3, DEFAULT_MAX_ATTEMPTS));
        assert!(should_retry(429, 1, DEFAULT_MAX_ATTEMPTS));
        assert!(should_retry(408, 1, DEFAULT_MAX_ATTEMPTS));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!should_retry(200, 1, DEFAULT_MAX_ATTEMPTS));
        assert!(!should_retry(301, 1, DEFAULT_MAX_ATTEMPTS));
        assert!(!should_retry(404, 1, DEFAULT_MAX_ATTEMPTS));
        assert!(!should_retry(401, 1, DEFAULT_MAX_ATTEMPTS));
    }

    #[test]
    fn test_attempt_ceiling() {
        assert!(should_retry(500, 25, DEFAULT_MAX_ATTEMPTS));
        assert!(!should_retry(500, 26, DEFAULT_MAX_ATTEMPTS));
        assert!(!should_retry(429, 100, DEFAULT_MAX_ATTEMPTS));
    }

    #[test]
    fn test_backoff_delays() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(5), Duration::from_secs(32));
        assert_eq!(policy.delay(9), Duration::from_secs(512));
        assert_eq!(policy.delay(10), Duration::from_secs(600));
        assert_eq!(policy.delay(20), Duration::from_secs(600));
        assert_eq!(policy.delay(64), Duration::from_secs(600));
    }

    #[test]
    fn test_backoff_scaled_unit() {
        let policy = BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(50));
        assert_eq!(policy.delay(2), Duration::from_millis(4));
        assert_eq!(policy.delay(8), Duration::from_millis(50));
    }
}

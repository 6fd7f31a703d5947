//! Retry policy: error classification and exponential-backoff-with-jitter scheduling.
//!
//! `delay = min(base * multiplier^attempt, max_cap) + uniform(0, jitter_max)`

use rand::RngExt;
use std::time::Duration;

const RETRYABLE_SUBSTRINGS: &[&str] = &[
    "timeout",
    "rate_limit",
    "connection",
    "network",
    "503",
    "504",
    "429",
    "temporary",
    "unavailable",
    "overloaded",
];

/// Policy parameters for the exponential-backoff-with-jitter schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max_cap: Duration,
    pub jitter_max: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            max_cap: Duration::from_secs(120),
            jitter_max: Duration::from_secs(2),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Classify an error message as retryable based on a lowercased substring match.
    ///
    /// A job-level error is retryable iff its message, lowercased, contains one of
    /// `timeout, rate_limit, connection, network, 503, 504, 429, temporary,
    /// unavailable, overloaded`. Anything else is terminal.
    pub fn is_retryable(error: &str) -> bool {
        let lower = error.to_lowercase();
        RETRYABLE_SUBSTRINGS.iter().any(|s| lower.contains(s))
    }

    /// Decide whether a failed job at `retry_count` attempts should be retried again.
    ///
    /// A job is retried iff the error is classified retryable AND `retry_count` has
    /// not yet reached `max_retries`.
    pub fn should_retry(&self, error: &str, retry_count: u32) -> bool {
        Self::is_retryable(error) && retry_count < self.max_retries
    }

    /// Compute the backoff delay for the given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt as i32);
        let raw_ms = self.base.as_millis() as f64 * exp;
        let capped_ms = raw_ms.min(self.max_cap.as_millis() as f64);

        let jitter_ms = if self.jitter_max.is_zero() {
            0.0
        } else {
            rand::rng().random_range(0.0..=self.jitter_max.as_millis() as f64)
        };

        Duration::from_millis((capped_ms + jitter_ms) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_substrings_match_case_insensitively() {
        assert!(RetryPolicy::is_retryable("Connection reset by peer"));
        assert!(RetryPolicy::is_retryable("upstream returned 503"));
        assert!(RetryPolicy::is_retryable("Rate_Limit exceeded"));
        assert!(RetryPolicy::is_retryable("service TEMPORARILY unavailable"));
    }

    #[test]
    fn non_retryable_errors_are_terminal() {
        assert!(!RetryPolicy::is_retryable("invalid request body"));
        assert!(!RetryPolicy::is_retryable("permission denied"));
        assert!(!RetryPolicy::is_retryable("resource not found"));
    }

    #[test]
    fn should_retry_respects_max_retries() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry("connection reset", 0));
        assert!(policy.should_retry("connection reset", 4));
        assert!(!policy.should_retry("connection reset", 5));
        assert!(!policy.should_retry("invalid input", 0));
    }

    #[test]
    fn delay_grows_exponentially_until_capped() {
        let policy = RetryPolicy {
            jitter_max: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(64));
        // 2^7 = 128s, capped at 120s
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(120));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(120));
    }

    #[test]
    fn jitter_adds_bounded_randomness() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_secs(1) + policy.jitter_max);
        }
    }
}

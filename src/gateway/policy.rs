// src/gateway/policy.rs

use std::time::Duration;

use crate::{config::Config, gateway::FetchError};

/// Bounded exponential backoff.
///
/// Pure: the gateway asks `should_retry(attempt, error)` after each failed
/// attempt and sleeps `delay(attempt)` before the next one. Nothing about the
/// request itself is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        }
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        attempt <= self.max_retries && error.is_retryable()
    }

    /// Delay before the retry that follows failed attempt `attempt`:
    /// `base * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert_eq!(policy.delay(4), Duration::from_millis(8000));
        assert_eq!(policy.delay(5), Duration::from_millis(10_000));
        assert_eq!(policy.delay(40), Duration::from_millis(10_000));
    }

    #[test]
    fn test_retries_only_transient_failures() {
        let policy = RetryPolicy::default();
        let server = FetchError::Server {
            status: 503,
            body: String::new(),
        };
        let client = FetchError::Client {
            status: 404,
            body: String::new(),
        };

        assert!(policy.should_retry(1, &server));
        assert!(policy.should_retry(2, &FetchError::Timeout("t".into())));
        assert!(policy.should_retry(1, &FetchError::Unreachable("u".into())));
        assert!(!policy.should_retry(3, &server));
        assert!(!policy.should_retry(1, &client));
        assert!(!policy.should_retry(1, &FetchError::Transport("tls".into())));
        assert_eq!(policy.max_attempts(), 3);
    }
}

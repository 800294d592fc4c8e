use rand::Rng;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport-level retry for the baseline backend.
///
/// Separate from identity rotation: this only smooths over transient
/// upstream hiccups on the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// First backoff; doubled on every further retry.
    pub backoff_ms: u64,
    pub statuses: Vec<u16>,
    /// Upper bound for honoring a numeric `Retry-After` header.
    pub max_retry_after_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 600,
            statuses: vec![429, 500, 502, 503, 504],
            max_retry_after_secs: 10,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Only idempotent reads are retried.
    pub fn allows(&self, method: &Method) -> bool {
        *method == Method::GET || *method == Method::HEAD
    }

    /// Whether retry number `retry` (0-based) may follow a response with `status`.
    pub fn should_retry(&self, method: &Method, status: u16, retry: u32) -> bool {
        retry < self.max_retries && self.allows(method) && self.statuses.contains(&status)
    }

    /// Wait before retry number `retry` (0-based): `backoff * 2^retry`,
    /// raised to `Retry-After` when the server asked for longer.
    pub fn backoff(&self, retry: u32, retry_after: Option<&str>) -> Duration {
        let exp = self
            .backoff_ms
            .saturating_mul(1u64 << retry.min(16));
        let base = Duration::from_millis(exp);
        match retry_after.and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(secs) => base.max(Duration::from_secs(secs.min(self.max_retry_after_secs))),
            None => base,
        }
    }
}

/// Random jitter in milliseconds within [0, range).
pub(crate) fn jitter_ms(range: u64) -> u64 {
    if range == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_600ms() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0, None), Duration::from_millis(600));
        assert_eq!(policy.backoff(1, None), Duration::from_millis(1_200));
        assert_eq!(policy.backoff(2, None), Duration::from_millis(2_400));
    }

    #[test]
    fn retry_after_is_honored_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0, Some("3")), Duration::from_secs(3));
        assert_eq!(policy.backoff(0, Some("3600")), Duration::from_secs(10));
        // Dates and junk are ignored.
        assert_eq!(
            policy.backoff(0, Some("Wed, 21 Oct 2015 07:28:00 GMT")),
            Duration::from_millis(600)
        );
    }

    #[test]
    fn only_transient_statuses_on_reads() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&Method::GET, 503, 0));
        assert!(policy.should_retry(&Method::HEAD, 429, 2));
        assert!(!policy.should_retry(&Method::GET, 503, 3));
        assert!(!policy.should_retry(&Method::GET, 403, 0));
        assert!(!policy.should_retry(&Method::POST, 503, 0));
        assert!(!RetryPolicy::none().should_retry(&Method::GET, 503, 0));
    }

    #[test]
    fn jitter_returns_within_range() {
        for _ in 0..100 {
            let result = jitter_ms(100);
            assert!(result < 100, "jitter_ms returned {}", result);
        }
    }

    #[test]
    fn jitter_zero_range_returns_zero() {
        assert_eq!(jitter_ms(0), 0);
    }
}

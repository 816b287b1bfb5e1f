//! Retry policy for transient GitHub API failures.

use reqwest::Method;
use std::time::Duration;

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

/// Status codes GitHub returns for transient failures.
pub const DEFAULT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Controls how often and how long the client waits before re-sending a request.
///
/// The delay before retry `n` (1-based) is `backoff_base * 2^(n-1)`, capped at
/// `max_backoff`. A `Retry-After` header on the failed response replaces the
/// computed delay, subject to the same cap.
///
/// Requests with non-idempotent methods (POST, PUT, PATCH, DELETE) are only retried
/// when `retry_non_idempotent` is set. A retried create or merge may otherwise be
/// applied twice by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub backoff_base: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Response statuses that are considered transient.
    pub retry_statuses: Vec<u16>,
    /// Whether POST, PUT, PATCH and DELETE requests are retried too.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            retry_non_idempotent: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns true if requests with this method may be sent more than once.
    pub fn allows_method(&self, method: &Method) -> bool {
        if *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS {
            return true;
        }
        self.retry_non_idempotent
    }

    /// Returns true if a response with this status should be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before the given retry (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self.backoff_base.saturating_mul(1u32 << exponent);
        delay.min(self.max_backoff)
    }

    /// Delay before the given retry, preferring a server supplied `Retry-After`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(delay) => delay.min(self.max_backoff),
            None => self.backoff_for(retry),
        }
    }
}

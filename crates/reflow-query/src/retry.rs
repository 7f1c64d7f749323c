//! Retry policies for remote calls.

use reflow_cache::{BackoffStrategy, FreshnessPolicy};

use crate::error::QueryError;

/// Retry policy for one remote call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Backoff schedule between attempts.
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` retries with default backoff.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::default(),
        }
    }

    /// A policy that never retries. Background prefetches use this so an
    /// abandoned prefetch cannot consume retry budget.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: BackoffStrategy::None,
        }
    }

    /// Derive the read retry policy from a freshness policy.
    pub fn for_reads(policy: &FreshnessPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            backoff: policy.retry_backoff.clone(),
        }
    }

    /// Set the backoff schedule.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether a failed attempt (0-indexed) should be retried.
    pub fn should_retry(&self, error: &QueryError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_errors_are_never_retried() {
        let policy = RetryPolicy::new(3);
        let err = QueryError::Remote { status: 422 };
        assert!(!policy.should_retry(&err, 0));
    }

    #[test]
    fn test_transient_errors_retry_within_budget() {
        let policy = RetryPolicy::new(1);
        let err = QueryError::Network("reset".into());
        assert!(policy.should_retry(&err, 0));
        assert!(!policy.should_retry(&err, 1));
    }

    #[test]
    fn test_none_never_retries() {
        let policy = RetryPolicy::none();
        assert!(!policy.should_retry(&QueryError::Timeout, 0));
    }
}

//! Run options: worker pool size, timeouts, and retry policy.

use std::time::Duration;

use crate::constants::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF, DEFAULT_RUN_TIMEOUT,
    DEFAULT_WORKER_THREADS, MAX_RETRY_BACKOFF, RETRY_BACKOFF_FACTOR,
};

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included. At least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Cap on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff: DEFAULT_RETRY_BACKOFF,
            max_backoff: MAX_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Retry `max_attempts` times in total without sleeping in between.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = RETRY_BACKOFF_FACTOR.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Options for one calculation run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Worker threads evaluating the features of a stage.
    pub worker_threads: usize,
    /// Timeout for each external resolution or fetch call.
    pub call_timeout: Duration,
    /// Ceiling for the cumulative duration of the run.
    pub run_timeout: Duration,
    /// Retry policy for transient resolver and store failures.
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl RunOptions {
    /// Normalize options, applying defaults where values are zero.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = DEFAULT_WORKER_THREADS;
        }
        if self.call_timeout.is_zero() {
            self.call_timeout = DEFAULT_CALL_TIMEOUT;
        }
        if self.run_timeout.is_zero() {
            self.run_timeout = DEFAULT_RUN_TIMEOUT;
        }
        if self.retry.max_attempts == 0 {
            self.retry.max_attempts = 1;
        }
        if self.retry.max_backoff < self.retry.initial_backoff {
            self.retry.max_backoff = self.retry.initial_backoff;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }

    #[test]
    fn normalize_zero_values() {
        let opts = RunOptions {
            worker_threads: 0,
            call_timeout: Duration::ZERO,
            run_timeout: Duration::ZERO,
            retry: RetryPolicy {
                max_attempts: 0,
                initial_backoff: Duration::from_millis(10),
                max_backoff: Duration::ZERO,
            },
        }
        .normalize();
        assert_eq!(opts.worker_threads, DEFAULT_WORKER_THREADS);
        assert_eq!(opts.call_timeout, DEFAULT_CALL_TIMEOUT);
        assert_eq!(opts.run_timeout, DEFAULT_RUN_TIMEOUT);
        assert_eq!(opts.retry.max_attempts, 1);
        assert_eq!(opts.retry.max_backoff, Duration::from_millis(10));
    }
}

//! Post-sign-in session resolution policy.
//!
//! After the provider accepts credentials the session may not be readable
//! right away. [`RetryPolicy`] says how many times to try, how long to wait
//! between tries, and which fallbacks run once every attempt has failed.
//!
//! Delays are fixed and jitter-free: retry `n` waits `n` units
//! under linear backoff and the first attempt runs immediately.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_UNIT: Duration = Duration::from_secs(1);
const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Delay schedule between resolution attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// Attempt `n` waits `unit * (n - 1)`.
    Linear(Duration),
    /// Every attempt after the first waits the same delay.
    Fixed(Duration),
    None,
}

/// Recovery step tried after every resolution attempt failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fallback {
    /// Build a `Recovered` user from the provider's attribute store.
    FetchAttributes,
    /// Build a `Degraded` user from the submitted email.
    Synthesize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    interruption_settle: Duration,
    fallbacks: Vec<Fallback>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Linear(DEFAULT_UNIT),
            interruption_settle: DEFAULT_SETTLE,
            fallbacks: vec![Fallback::FetchAttributes, Fallback::Synthesize],
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of resolution attempts. Values above 3 are capped and
    /// zero is raised to one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, DEFAULT_MAX_ATTEMPTS);
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait applied after an interrupted sign-in before falling back.
    #[must_use]
    pub fn with_interruption_settle(mut self, settle: Duration) -> Self {
        self.interruption_settle = settle;
        self
    }

    #[must_use]
    pub fn with_fallbacks(mut self, fallbacks: Vec<Fallback>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn interruption_settle(&self) -> Duration {
        self.interruption_settle
    }

    #[must_use]
    pub fn fallbacks(&self) -> &[Fallback] {
        &self.fallbacks
    }

    /// Delay before the 1-based `attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let waits = attempt.saturating_sub(1);
        match self.backoff {
            Backoff::Linear(unit) => unit.saturating_mul(waits),
            Backoff::Fixed(delay) if waits > 0 => delay,
            Backoff::Fixed(_) | Backoff::None => Duration::ZERO,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempts are exhausted. The closure receives the 1-based attempt.
    ///
    /// # Errors
    /// Returns the error of the last attempt made.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + fmt::Display,
    {
        let mut attempt = 1;
        loop {
            let delay = self.delay_for_attempt(attempt);
            if !delay.is_zero() {
                debug!(attempt, delay_ms = delay.as_millis(), "waiting before retry");
                sleep(delay).await;
            }
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    warn!(attempt, "session resolution exhausted: {err}");
                    return Err(err);
                }
                Err(err) => {
                    debug!(attempt, "session resolution failed: {err}");
                    attempt += 1;
                }
            }
        }
    }
}

/// Errors that can tell whether another attempt is worthwhile.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[derive(Debug, Eq, PartialEq)]
    struct TestError {
        retryable: bool,
        attempt: u32,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "attempt {} failed", self.attempt)
        }
    }

    impl RetryableError for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[test]
    fn defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.interruption_settle(), Duration::from_secs(2));
        assert_eq!(
            policy.fallbacks(),
            &[Fallback::FetchAttributes, Fallback::Synthesize]
        );
    }

    #[test]
    fn linear_delays_start_immediately() {
        let policy = RetryPolicy::new().with_backoff(Backoff::Linear(Duration::from_millis(500)));
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1000));
    }

    #[test]
    fn fixed_and_none() {
        let fixed = RetryPolicy::new().with_backoff(Backoff::Fixed(Duration::from_secs(1)));
        assert_eq!(fixed.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(fixed.delay_for_attempt(3), Duration::from_secs(1));
        let none = RetryPolicy::new().with_backoff(Backoff::None);
        assert_eq!(none.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn attempts_are_capped() {
        assert_eq!(RetryPolicy::new().with_max_attempts(10).max_attempts(), 3);
        assert_eq!(RetryPolicy::new().with_max_attempts(0).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_succeeds_on_third_attempt() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let mut calls = Vec::new();
        let result = policy
            .run(|attempt| {
                calls.push(attempt);
                async move {
                    if attempt < 3 {
                        Err(TestError {
                            retryable: true,
                            attempt,
                        })
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls, vec![1, 2, 3]);
        // 0s + 1s + 2s
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_last_error() {
        let policy = RetryPolicy::new().with_max_attempts(2);
        let mut count = 0;
        let result: Result<(), TestError> = policy
            .run(|attempt| {
                count += 1;
                async move {
                    Err(TestError {
                        retryable: true,
                        attempt,
                    })
                }
            })
            .await;
        assert_eq!(
            result,
            Err(TestError {
                retryable: true,
                attempt: 2
            })
        );
        assert_eq!(count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_non_retryable() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let mut count = 0;
        let result: Result<(), TestError> = policy
            .run(|attempt| {
                count += 1;
                async move {
                    Err(TestError {
                        retryable: false,
                        attempt,
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(count, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}

//! Retry wrapper for remote catalog calls.
//!
//! The catalog endpoint drops connections and returns spurious rejection
//! statuses under load, so every fetch goes through [`with_retry`]. The
//! default [`RetryPolicy`] retries forever with no delay; a bounded attempt
//! count and a growing, optionally jittered delay can be injected through
//! [`RetryPolicy::max_attempts`] and [`BackoffPolicy`] without touching the
//! calling code.
//!
//! Validation failures are raised above this layer on purpose: a payload
//! that fails its structural checks will fail them on every attempt, so the
//! worker skips the id instead of retrying it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// How a failed remote call is treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network-level failure: connection reset, timeout, DNS.
    Transport,
    /// A syntactically valid response carrying a non-success status.
    RejectedStatus,
    /// Anything else that reached this layer.
    Other,
}

/// Classifies an error for the retry loop.
pub trait Classify {
    fn class(&self) -> FailureClass;
}

/// Controls how often and how fast a failed call is re-executed.
///
/// The default retries forever and immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    /// Total number of attempts before the last error is surfaced.
    /// `None` retries without bound.
    pub max_attempts: Option<u32>,
    /// Delay between attempts. `None` retries immediately.
    pub backoff: Option<BackoffPolicy>,
}

impl RetryPolicy {
    /// A policy that gives up after `attempts` calls.
    pub fn bounded(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts.max(1)),
            backoff: None,
        }
    }

    /// Adds a backoff schedule to this policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }
}

/// Delay schedule for retries.
///
/// The delay for attempt `n` (0-indexed) is `first × factor^n`, clamped to
/// `max`, with [`Jitter`] applied last. The base delay is derived purely
/// from the attempt number, so jitter output never feeds back into later
/// delays.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Cap for the computed delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant delay).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: Jitter,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: Jitter::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exponent);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };

        self.jitter.apply(base)
    }
}

/// Randomization of retry delays, to keep concurrent workers from
/// hammering a struggling endpoint in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Use the exact computed delay.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`.
    Equal,
}

impl Jitter {
    fn apply(self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rng.random_range(0..=ms)),
            Jitter::Equal => {
                let half = ms / 2;
                let jitter = if half == 0 { 0 } else { rng.random_range(0..=half) };
                Duration::from_millis(half + jitter)
            }
        }
    }
}

/// Runs `op` until it succeeds or the policy's attempt bound is exhausted.
///
/// `op` receives the 0-based attempt number, for diagnostics only. Every
/// failure is logged with `what` and the attempt count; transport and
/// rejected-status failures at `warn`, anything else at `error`. All
/// classes are retried. When `max_attempts` runs out the last error is
/// returned as-is.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Classify + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                match e.class() {
                    FailureClass::Transport => {
                        warn!("Transport error during {}: {} (attempt {})", what, e, attempt)
                    }
                    FailureClass::RejectedStatus => {
                        warn!("Rejected status during {}: {} (attempt {})", what, e, attempt)
                    }
                    FailureClass::Other => {
                        error!("Unexpected error during {}: {} (attempt {})", what, e, attempt)
                    }
                }
                if let Some(max) = policy.max_attempts {
                    if attempt + 1 >= max {
                        return Err(e);
                    }
                }
                if let Some(backoff) = policy.backoff {
                    let delay = backoff.next(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(FailureClass);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error ({:?})", self.0)
        }
    }

    impl Classify for TestError {
        fn class(&self) -> FailureClass {
            self.0
        }
    }

    #[tokio::test]
    async fn test_success_is_returned_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> =
            with_retry(RetryPolicy::default(), "test", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let mut last_attempt = 0;
        let result: Result<&str, TestError> =
            with_retry(RetryPolicy::default(), "test", |attempt| {
                last_attempt = attempt;
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError(FailureClass::Transport))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(
            last_attempt >= 2,
            "attempt counter must reach 2 before success"
        );
    }

    #[tokio::test]
    async fn test_bounded_policy_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = with_retry(RetryPolicy::bounded(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError(FailureClass::RejectedStatus)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_failures_are_still_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = with_retry(RetryPolicy::default(), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(TestError(FailureClass::Other))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_attempt_zero_returns_first() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: Jitter::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_exponential_growth() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: Jitter::None,
        };
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_constant_factor() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: Jitter::None,
        };
        for attempt in 0..10 {
            assert_eq!(policy.next(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn test_backoff_clamped_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: Jitter::None,
        };
        assert_eq!(policy.next(10), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_full_jitter_bounds() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: Jitter::Full,
        };
        for attempt in 0..50 {
            assert!(policy.next(attempt) <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: Jitter::Equal,
        };
        for attempt in 0..50 {
            let delay = policy.next(attempt);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1000));
        }
    }
}

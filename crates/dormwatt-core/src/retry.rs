//! Retry policy: one uniform loop, per-channel nuance lives in the attempt.
//!
//! Each attempt reports an [`Outcome`]: success ends the loop, a retryable
//! failure sleeps per the wait schedule and tries again, a terminal failure
//! ends the loop immediately. After the last attempt the last error is
//! returned unchanged.

use std::future::Future;
use std::time::Duration;

use crate::error::{DormwattError, Result};

/// Upper bound for any single exponential wait.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Result of one delivery or fetch attempt.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    RetryableFailure(DormwattError),
    TerminalFailure(DormwattError),
}

impl<T> Outcome<T> {
    /// Classify a plain `Result` by [`DormwattError::is_retryable`].
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) if e.is_retryable() => Outcome::RetryableFailure(e),
            Err(e) => Outcome::TerminalFailure(e),
        }
    }
}

/// Wait schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same wait after every failed attempt.
    Fixed(Duration),
    /// `multiplier * 2^(k-1)` after the k-th failed attempt, capped at `max`.
    Exponential { multiplier: Duration, max: Duration },
}

/// Attempt count plus wait schedule for one invocation of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, wait: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(wait),
        }
    }

    pub fn exponential(max_attempts: u32, multiplier: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                multiplier,
                max: MAX_BACKOFF,
            },
        }
    }

    /// No waiting at all. Used by tests and one-shot CLI checks.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Upstream reading: 3 attempts, 10s, 20s.
    pub fn upstream() -> Self {
        Self::exponential(3, Duration::from_secs(10))
    }

    /// Wait after the `attempt`-th failure (1-based).
    pub fn wait_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(wait) => wait,
            Backoff::Exponential { multiplier, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                multiplier.saturating_mul(factor).min(max)
            }
        }
    }

    /// The full wait schedule `[w1, w2, ...]` (one entry per gap between attempts).
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts.max(1)).map(|a| self.wait_after(a)).collect()
    }

    /// Run `attempt` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `attempt` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt(n).await {
                Outcome::Success(value) => {
                    if n > 1 {
                        tracing::info!("✅ {label} succeeded on attempt {n}/{max_attempts}");
                    }
                    return Ok(value);
                }
                Outcome::TerminalFailure(e) => {
                    tracing::warn!("⛔ {label} failed terminally on attempt {n}: {e}");
                    return Err(e);
                }
                Outcome::RetryableFailure(e) => {
                    if n >= max_attempts {
                        tracing::error!("❌ {label} failed after {max_attempts} attempts: {e}");
                        return Err(e);
                    }
                    let wait = self.wait_after(n);
                    tracing::warn!(
                        "⚠️ {label} attempt {n}/{max_attempts} failed: {e} (retrying in {}s)",
                        wait.as_secs_f32()
                    );
                    tokio::time::sleep(wait).await;
                    n += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_schedule() {
        let policy = RetryPolicy::exponential(3, Duration::from_secs(15));
        assert_eq!(
            policy.schedule(),
            vec![Duration::from_secs(15), Duration::from_secs(30)]
        );
        assert_eq!(RetryPolicy::upstream().schedule(), vec![
            Duration::from_secs(10),
            Duration::from_secs(20)
        ]);
    }

    #[test]
    fn test_exponential_is_capped() {
        let policy = RetryPolicy::exponential(12, Duration::from_secs(15));
        assert_eq!(policy.wait_after(10), MAX_BACKOFF);
    }

    #[test]
    fn test_fixed_schedule() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(10));
        assert_eq!(policy.schedule(), vec![Duration::from_secs(10); 4]);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(5)
            .run("flaky", |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Outcome::RetryableFailure(DormwattError::Channel("down".into()))
                    } else {
                        Outcome::Success(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_exact_attempt_count() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::immediate(4)
            .run("always-down", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Outcome::RetryableFailure(DormwattError::Channel("down".into())) }
            })
            .await;
        assert!(matches!(result, Err(DormwattError::Channel(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_terminal_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::immediate(5)
            .run("bad-config", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Outcome::TerminalFailure(DormwattError::Config("nope".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_result_classifies() {
        assert!(matches!(
            Outcome::<()>::from_result(Err(DormwattError::Upstream("x".into()))),
            Outcome::RetryableFailure(_)
        ));
        assert!(matches!(
            Outcome::<()>::from_result(Err(DormwattError::Config("x".into()))),
            Outcome::TerminalFailure(_)
        ));
    }
}

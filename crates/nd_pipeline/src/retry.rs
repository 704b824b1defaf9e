use nd_core::{Error, Result, RunId, StepName};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Bounded retry for steps failing with a retryable error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per step, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately, mostly for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            use_exponential_backoff: false,
        }
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms;
        let delay = if self.use_exponential_backoff {
            base.saturating_mul(1u64 << attempt.saturating_sub(1).min(20))
        } else {
            base
        };
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Independent timeout per step. Expiry counts as a retryable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTimeouts {
    pub fetch_secs: u64,
    pub summarize_secs: u64,
    pub deliver_secs: u64,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            fetch_secs: 30,
            summarize_secs: 120,
            deliver_secs: 30,
        }
    }
}

impl StepTimeouts {
    pub fn for_step(&self, step: StepName) -> Duration {
        let secs = match step {
            StepName::FetchNews => self.fetch_secs,
            StepName::SummarizeNews => self.summarize_secs,
            StepName::DeliverDigest => self.deliver_secs,
            StepName::AssemblePrompt => 0,
        };
        Duration::from_secs(secs.max(1))
    }
}

/// Result of a step together with how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// The retryable error a timed-out attempt of `step` is reported as.
fn timeout_error(step: StepName, limit: Duration) -> Error {
    let message = format!("step '{}' timed out after {}s", step, limit.as_secs());
    match step {
        StepName::FetchNews => Error::Fetch(message),
        StepName::DeliverDigest => Error::Delivery(message),
        StepName::SummarizeNews | StepName::AssemblePrompt => Error::InferenceUnavailable(message),
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up. Cancellation interrupts the backoff
/// wait, never an attempt in flight.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    limit: Duration,
    run_id: RunId,
    step: StepName,
    cancel: &CancellationToken,
    mut operation: F,
) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match timeout(limit, operation(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(step, limit)),
        };

        let error = match result {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(error) => error,
        };

        if !error.is_retryable() || attempt >= policy.attempts() {
            return Attempted {
                result: Err(error),
                attempts: attempt,
            };
        }

        let delay = policy.delay_after(attempt);
        tracing::warn!(
            run_id = %run_id,
            step = %step,
            attempt,
            max_attempts = policy.attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Step failed, retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                return Attempted {
                    result: Err(Error::Cancelled(run_id)),
                    attempts: attempt,
                };
            }
            _ = sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_delays_are_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 3_000,
            use_exponential_backoff: true,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2_000));
        assert_eq!(policy.delay_after(4), Duration::from_millis(3_000));
        assert_eq!(policy.delay_after(40), Duration::from_millis(3_000));
    }

    #[tokio::test]
    async fn test_retryable_error_uses_whole_budget() {
        let calls = AtomicU32::new(0);
        let outcome: Attempted<()> = with_retry(
            &RetryPolicy::immediate(3),
            Duration::from_secs(5),
            RunId::new(),
            StepName::FetchNews,
            &CancellationToken::new(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Fetch("connection refused".into())) }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempts, 3);
        assert!(matches!(outcome.result, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_at_once() {
        let calls = AtomicU32::new(0);
        let outcome: Attempted<()> = with_retry(
            &RetryPolicy::immediate(3),
            Duration::from_secs(5),
            RunId::new(),
            StepName::SummarizeNews,
            &CancellationToken::new(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::MalformedResponse("no choices".into())) }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let outcome = with_retry(
            &RetryPolicy::immediate(3),
            Duration::from_secs(5),
            RunId::new(),
            StepName::SummarizeNews,
            &CancellationToken::new(),
            |attempt| async move {
                if attempt < 2 {
                    Err(Error::InferenceUnavailable("503".into()))
                } else {
                    Ok(attempt)
                }
            },
        )
        .await;

        assert_eq!(outcome.result.unwrap(), 2);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_timeout_is_retryable_failure() {
        let calls = AtomicU32::new(0);
        let outcome: Attempted<()> = with_retry(
            &RetryPolicy::immediate(2),
            Duration::from_millis(20),
            RunId::new(),
            StepName::FetchNews,
            &CancellationToken::new(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let err = outcome.result.unwrap_err();
        assert_eq!(err.kind(), nd_core::ErrorKind::Fetch);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 60_000,
            max_delay_ms: 60_000,
            use_exponential_backoff: false,
        };
        let outcome: Attempted<()> = with_retry(
            &policy,
            Duration::from_secs(5),
            RunId::new(),
            StepName::FetchNews,
            &cancel,
            |_| async { Err(Error::Fetch("flaky".into())) },
        )
        .await;

        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.result, Err(Error::Cancelled(_))));
    }
}

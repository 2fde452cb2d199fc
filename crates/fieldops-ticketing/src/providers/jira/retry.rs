use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::interface::CoreError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Bounded exponential backoff for tracker requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Delay after the failed attempt number `attempt` (1-based). A
    /// server-provided `Retry-After` replaces the computed backoff; both are
    /// capped at `max_backoff`.
    pub fn delay_after(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(requested) = retry_after {
            return requested.min(self.max_backoff);
        }
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

#[derive(Debug)]
pub(crate) enum AttemptFailure {
    Retryable {
        error: CoreError,
        retry_after: Option<Duration>,
    },
    Fatal(CoreError),
}

pub(crate) async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    action: &str,
    mut attempt_fn: F,
) -> Result<T, CoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptFailure::Fatal(error)) => return Err(error),
            Err(AttemptFailure::Retryable { error, retry_after }) => {
                if attempt >= max_attempts {
                    return Err(error);
                }
                let delay = policy.delay_after(attempt, retry_after);
                warn!(
                    action,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "tracker request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
        }
    }

    fn unavailable() -> CoreError {
        CoreError::Remote {
            status: 503,
            body: "maintenance".to_owned(),
        }
    }

    #[test]
    fn delay_doubles_and_caps_at_max_backoff() {
        let policy = policy(5);
        assert_eq!(policy.delay_after(1, None), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2, None), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3, None), Duration::from_millis(250));
        assert_eq!(policy.delay_after(40, None), Duration::from_millis(250));
    }

    #[test]
    fn retry_after_is_honored_but_capped() {
        let policy = policy(3);
        assert_eq!(
            policy.delay_after(1, Some(Duration::from_millis(50))),
            Duration::from_millis(50)
        );
        assert_eq!(
            policy.delay_after(1, Some(Duration::from_secs(120))),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn retryable_statuses_exclude_client_errors() {
        assert!(RetryPolicy::is_retryable_status(429));
        assert!(RetryPolicy::is_retryable_status(503));
        assert!(!RetryPolicy::is_retryable_status(400));
        assert!(!RetryPolicy::is_retryable_status(401));
        assert!(!RetryPolicy::is_retryable_status(404));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_with_backoff() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = run_with_retry(&policy(3), "search", |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call < 3 {
                    Err(AttemptFailure::Retryable {
                        error: unavailable(),
                        retry_after: None,
                    })
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(310), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = run_with_retry(&policy(2), "search", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AttemptFailure::Retryable {
                    error: unavailable(),
                    retry_after: None,
                })
            }
        })
        .await;

        assert_eq!(result.expect_err("exhausted"), unavailable());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = run_with_retry(&policy(5), "transition", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptFailure::Fatal(CoreError::Unauthorized("401".to_owned()))) }
        })
        .await;

        assert!(matches!(result, Err(CoreError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

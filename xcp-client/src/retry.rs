//! Exponential backoff retry combinator
//!
//! Wraps one logical operation and re-invokes it while the failure is transient.
//! The delay after failed attempt `k` (0-indexed) is
//! `min(initial * 2^k + uniform(0, 0.3 * initial * 2^k), 30s)`.

use crate::metrics::XCP_RETRIES_TOTAL;
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Upper bound for any single backoff delay (milliseconds)
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Jitter fraction applied on top of the exponential base delay
pub const JITTER_FACTOR: f64 = 0.3;

/// Retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,

    /// Base delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that performs exactly one attempt
    pub fn no_retry(&self) -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: self.initial_delay_ms,
        }
    }
}

/// Delay to wait after failed attempt `attempt` (0-indexed)
pub fn backoff_delay(attempt: u32, initial_delay_ms: u64) -> Duration {
    let base = initial_delay_ms.saturating_mul(2u64.saturating_pow(attempt)) as f64;
    let jitter = rand::thread_rng().gen_range(0.0..=JITTER_FACTOR) * base;
    let delay_ms = (base + jitter).min(MAX_BACKOFF_MS as f64);
    Duration::from_millis(delay_ms.round() as u64)
}

/// Default retry predicate: 429, >= 500 and network failures
pub fn default_should_retry(err: &Error) -> bool {
    err.is_transient()
}

/// Run `op` under `policy` with the default retry predicate
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_if(policy, default_should_retry, op).await
}

/// Run `op` under `policy`, retrying only failures accepted by `should_retry`.
///
/// Exhausting the policy returns the last error unchanged.
pub async fn with_retry_if<T, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !should_retry(&err) {
                    return Err(err);
                }

                let delay = backoff_delay(attempt, policy.initial_delay_ms);
                attempt += 1;
                warn!(
                    "Retry attempt {}/{} after {}ms: {}",
                    attempt,
                    policy.max_retries,
                    delay.as_millis(),
                    err
                );
                XCP_RETRIES_TOTAL.inc();
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> Error {
        Error::HttpStatus {
            status: 503,
            code: "HTTP_503".to_string(),
            message: "unavailable".to_string(),
            correlation_id: None,
            details: None,
        }
    }

    #[test]
    fn test_backoff_within_jitter_band() {
        for attempt in 0..5 {
            let base = 100u64 * 2u64.pow(attempt);
            for _ in 0..50 {
                let delay = backoff_delay(attempt, 100).as_millis() as u64;
                assert!(delay >= base, "attempt {attempt}: {delay} < {base}");
                assert!(delay <= base + base * 3 / 10 + 1, "attempt {attempt}: {delay}");
            }
        }
    }

    #[test]
    fn test_backoff_never_exceeds_cap() {
        for attempt in 0..80 {
            assert!(backoff_delay(attempt, 1_000) <= Duration::from_millis(MAX_BACKOFF_MS));
            assert!(backoff_delay(attempt, u64::MAX) <= Duration::from_millis(MAX_BACKOFF_MS));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_invoke_n_plus_one_times() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1_000,
        };

        let result: Result<()> = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(result, Err(Error::HttpStatus { status: 503, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_is_propagated() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 10,
        };

        let result: Result<()> = with_retry(&policy, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Network(format!("failure {}", n)))
        })
        .await;

        match result {
            Err(Error::Network(msg)) => assert_eq!(msg, "failure 2"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<()> = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::SchemaValidation("missing field".to_string()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::SchemaValidation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 500,
        };

        let start = tokio::time::Instant::now();
        let value = with_retry(&policy, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable())
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms base delays, each with at most 30% jitter
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(1_500));
        assert!(waited <= Duration::from_millis(1_960));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 10,
        };

        let result: Result<()> = with_retry_if(
            &policy,
            |err| matches!(err, Error::RequestSetup(_)),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::RequestSetup("flaky".to_string()))
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::default().no_retry();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.initial_delay_ms, 1_000);
    }
}

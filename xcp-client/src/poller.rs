//! Remittance completion polling
//!
//! ```text
//! CREATED ──► PROCESSING ──► COMPLETED | REJECTED | FAILED | CANCELLED
//! ```
//!
//! Transitions are driven by the remote system; the poller only observes them. Each
//! poll attempt is one retried fetch, so a single attempt may internally perform
//! several physical requests before it succeeds or fails.

use crate::metrics::XCP_POLL_ATTEMPTS_TOTAL;
use crate::types::RemittanceDetail;
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Source of remittance status snapshots
#[async_trait]
pub trait RemittanceStatusSource: Send + Sync {
    /// Fetch the current detail of `transaction_id` (retries included)
    async fn fetch_remittance(&self, transaction_id: &str) -> Result<RemittanceDetail>;
}

/// Polling budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Maximum number of fetches
    pub max_attempts: u32,
    /// Pause between fetches
    pub interval: Duration,
    /// Wall-clock budget, checked before each fetch
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(5_000),
            timeout: Duration::from_millis(120_000),
        }
    }
}

impl PollOptions {
    /// Options from millisecond values
    pub fn from_millis(max_attempts: u32, interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            max_attempts,
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// Poll until a terminal status, the timeout, or the attempt budget
pub async fn wait_for_completion<S>(
    source: &S,
    transaction_id: &str,
    options: &PollOptions,
) -> Result<RemittanceDetail>
where
    S: RemittanceStatusSource + ?Sized,
{
    wait_for_completion_with_cancel(source, transaction_id, options, &CancellationToken::new())
        .await
}

/// [`wait_for_completion`] that also stops when `cancel` fires
pub async fn wait_for_completion_with_cancel<S>(
    source: &S,
    transaction_id: &str,
    options: &PollOptions,
    cancel: &CancellationToken,
) -> Result<RemittanceDetail>
where
    S: RemittanceStatusSource + ?Sized,
{
    let start = Instant::now();
    info!(
        "Polling remittance {} (max {} attempts, every {}ms)",
        transaction_id,
        options.max_attempts,
        options.interval.as_millis()
    );

    for attempt in 1..=options.max_attempts {
        if start.elapsed() > options.timeout {
            return Err(Error::PollingTimeout {
                transaction_id: transaction_id.to_string(),
                attempt,
                timeout_ms: options.timeout.as_millis() as u64,
            });
        }
        if cancel.is_cancelled() {
            return Err(cancelled(transaction_id));
        }

        let detail = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(transaction_id)),
            detail = source.fetch_remittance(transaction_id) => detail?,
        };

        XCP_POLL_ATTEMPTS_TOTAL
            .with_label_values(&[detail.status.as_str()])
            .inc();
        info!(
            "Poll attempt {}/{}: {}",
            attempt, options.max_attempts, detail.status
        );

        if detail.status.is_terminal() {
            info!("Remittance {} reached final state {}", transaction_id, detail.status);
            return Ok(detail);
        }

        if attempt < options.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled(transaction_id)),
                _ = tokio::time::sleep(options.interval) => {}
            }
        }
    }

    Err(Error::MaxAttemptsExceeded {
        transaction_id: transaction_id.to_string(),
        attempts: options.max_attempts,
    })
}

fn cancelled(transaction_id: &str) -> Error {
    Error::PollingCancelled {
        transaction_id: transaction_id.to_string(),
    }
}

//! Shared retry utilities for adapter network calls.
//!
//! Only transient transport failures are retried in-process; rate limits
//! and auth failures propagate immediately so the executor can end the
//! direction. Cross-run retries of whole activities are handled by the
//! pending-status mechanism, not here.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::platform::AdapterError;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Maximum in-process attempts for a single network call.
pub const MAX_TRANSIENT_RETRIES: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_TRANSIENT_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// The standard backoff used by all adapters.
#[must_use]
pub fn default_backoff() -> ExponentialBuilder {
    RetryConfig::default().into_backoff()
}

/// Run `operation`, retrying transient transport errors with exponential
/// backoff. `label` names the call in retry logs.
pub async fn with_transient_retry<T, F, Fut>(
    label: &str,
    operation: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let label = label.to_string();
    operation
        .retry(default_backoff())
        .notify(move |err: &AdapterError, dur| {
            tracing::debug!(
                call = %label,
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "Transient error, retrying"
            );
        })
        .when(AdapterError::is_transient)
        .await
}

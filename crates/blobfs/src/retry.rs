//! Bounded exponential backoff for transient client failures

use std::future::Future;

use blobfs_core::{Error, Result, RetryConfig};
use tracing::warn;

/// Execute an async operation, retrying transient errors with backoff
///
/// Non-retryable errors (including `NotFound`) are returned on the first
/// occurrence. At most `config.max_attempts` attempts are made.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                if attempt + 1 < attempts {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        %operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Internal {
        message: format!("{} failed after {} attempts", operation, attempts),
    }))
}

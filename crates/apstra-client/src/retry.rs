//! Retry loop for requests the controller refuses transiently

use crate::backoff::FibonacciBackoff;
use crate::error::ApstraError;
use std::future::Future;
use tracing::warn;

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` attempts have been made.
///
/// Retryable errors are those for which [`ApstraError::is_retryable`] holds
/// (409 conflicts and 429 rate limiting). The operation is re-invoked from
/// scratch on each attempt, so it should re-read any state it depends on
/// (e.g. the blueprint's staging revision).
pub async fn with_conflict_retry<T, F, Fut>(
    backoff: FibonacciBackoff,
    max_attempts: u32,
    op: F,
) -> Result<T, ApstraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApstraError>>,
{
    with_retry(backoff, max_attempts, ApstraError::is_retryable, op).await
}

/// Like [`with_conflict_retry`], with the caller deciding which errors are worth another attempt.
pub async fn with_retry<T, F, Fut, P>(
    mut backoff: FibonacciBackoff,
    max_attempts: u32,
    should_retry: P,
    mut op: F,
) -> Result<T, ApstraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApstraError>>,
    P: Fn(&ApstraError) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if should_retry(&e) && attempt < max_attempts => {
                let delay = backoff.next_backoff();
                warn!(
                    "Attempt {}/{} failed with {}; retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

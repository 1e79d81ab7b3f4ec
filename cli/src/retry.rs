//! Bounded exponential backoff for idempotent remote operations.
//!
//! Only transport-class failures (connect, timeout) are retried; provider
//! refusals like quota exhaustion surface immediately.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

use crate::error::FleetError;

/// Retry budget applied to idempotent operations (list, read, destroy).
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Initial delay; doubles per attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Run `op` up to `attempts` times, sleeping `base * 2^n` between tries.
///
/// Retries only when the error downcasts to a retryable [`FleetError`];
/// everything else returns on the first failure.
pub async fn with_backoff<T, F, Fut>(attempts: u32, base: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = base;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err
                    .downcast_ref::<FleetError>()
                    .is_some_and(FleetError::is_retryable);
                if !retryable || attempt >= attempts {
                    return Err(err);
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

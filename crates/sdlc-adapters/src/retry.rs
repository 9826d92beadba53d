use std::future::Future;
use std::time::Duration;

use crate::error::AdaptersError;

/// Retries `op` up to `max_attempts` times (attempt 1 is the first try, not
/// a retry) with exponential backoff, doubling `base_delay` after each
/// failed attempt. Only retries when the error is transient
/// (spec.md §7: "Transient external ... Retry at most 3 times with
/// exponential backoff within the worker; surface on exhaustion").
pub async fn retry_transient<F, Fut, T>(
    what: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, AdaptersError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdaptersError>>,
{
    let mut delay = base_delay;
    let mut last_err = None;
    for attempt in 1..=max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                tracing::warn!(attempt, %what, error = %err, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| AdaptersError::permanent(what, "exhausted retries with no recorded error")))
}

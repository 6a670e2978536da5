//! Retry loop for batch writes.

use std::fmt::Display;
use std::future::Future;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `op` receives the 1-based attempt number. `on_retry` is called before
/// each backoff sleep with the attempt that just failed.
pub async fn retry_with_backoff<T, E, F, Fut, Obs>(
    policy: &RetryConfig,
    operation: &'static str,
    mut op: F,
    mut on_retry: Obs,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    Obs: FnMut(u32, &E),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= max_attempts => {
                tracing::warn!(
                    operation,
                    attempts = attempt,
                    error = %error,
                    "Giving up after final attempt"
                );
                return Err(error);
            }
            Err(error) => {
                on_retry(attempt, &error);
                let delay = calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
                tracing::debug!(
                    operation,
                    attempt,
                    delay = ?delay,
                    error = %error,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

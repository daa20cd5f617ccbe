//! Retry logic for operations that fail transiently.

use super::config::RetryConfig;
use metasync_core::Result;
use std::future::Future;
use tokio::time::sleep;

/// Run `operation` up to `max_attempts` times, backing off between attempts.
///
/// Only errors where [`Error::is_transient`](metasync_core::Error::is_transient) holds are retried; anything
/// else is returned at once.
pub async fn retry<F, Fut, T>(config: &RetryConfig, max_attempts: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempt = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) if error.is_transient() && attempt + 1 < max_attempts => {
                let delay = config.calculate_delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient error, retrying after backoff"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

use std::{fmt::Display, future::Future, time::Duration};

use tracing::warn;

/// Runs `op` up to `attempts` times, sleeping `delay` between failures, and
/// returns the last error once attempts are exhausted.
///
/// Only the profile insert that follows account creation goes through here;
/// the operation must be idempotent because an attempt reported as failed may
/// still have been applied.
pub async fn retry_fixed<T, E, F, Fut>(
    operation: &str,
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    error = %err,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

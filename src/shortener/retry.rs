//! Bounded retry for fallible async operations.

use std::future::Future;
use tracing::debug;

/// Run `op` up to `max_attempts` times, returning the first success or the
/// last error. The attempt number (starting at 1) is passed to `op`.
/// A `max_attempts` of zero still runs the operation once.
pub async fn with_attempts<T, E, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                debug!(attempt, "attempt failed: {err}");
                attempt += 1;
            }
        }
    }
}

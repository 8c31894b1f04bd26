//! Bounded deadlines for calls into external collaborators.
//!
//! Persistence, hashing and notification calls must never block a request
//! indefinitely. Wrapping them here keeps the timeout error uniform.

use crate::error::PlatformError;
use std::future::Future;
use std::time::Duration;

/// Run `fut` and fail with [`PlatformError::Timeout`] if it does not finish
/// within `limit`.
///
/// The inner future is dropped on expiry, so it must not leave partial
/// state behind when cancelled.
///
/// # Errors
///
/// Returns [`PlatformError::Timeout`] naming `operation` when the deadline
/// passes first.
///
/// # Examples
///
/// ```
/// use rust_common::with_deadline;
/// use std::time::Duration;
///
/// # tokio_test_block_on(async {
/// let value = with_deadline(Duration::from_secs(1), "noop", async { 7 }).await;
/// assert_eq!(value.unwrap(), 7);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
/// # }
/// ```
pub async fn with_deadline<F, T>(
    limit: Duration,
    operation: &str,
    fut: F,
) -> Result<T, PlatformError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::warn!(operation = %operation, limit_ms = limit.as_millis() as u64, "Deadline exceeded");
        PlatformError::Timeout(format!("{operation} exceeded {}ms", limit.as_millis()))
    })
}

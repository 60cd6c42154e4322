/// Per-attempt deadline for async delivery operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Execute a future with a deadline. Callers decide how a blown deadline
/// is classified (the dispatcher treats it as a transient failure).
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError(duration))
}

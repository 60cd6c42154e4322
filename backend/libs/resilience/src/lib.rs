/// Resilience primitives for delivery paths
///
/// This library provides the retry and timeout building blocks used by the
/// routing core:
/// - **Retry**: exponential backoff with full jitter, a retryability
///   predicate, and cooperative cancellation between attempts
/// - **Timeout**: enforces a per-attempt time limit on async operations
///
/// # Example: retry a flaky call
///
/// ```rust,no_run
/// use resilience::{with_retry, RetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let config = RetryConfig::default();
///
///     let result = with_retry(&config, None, |_: &String| true, || async {
///         // Your delivery attempt here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use retry::{nominal_backoff, with_retry, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutError};

/// Retry policy with exponential backoff and full jitter
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Nominal backoff after the first failed attempt
    pub base_backoff: Duration,
    /// Ceiling for any single backoff delay
    pub max_backoff: Duration,
    /// Multiplier applied to the nominal delay after each failed attempt
    pub backoff_multiplier: f64,
    /// Sample each delay uniformly from (0, nominal] (full jitter)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("all {attempts} attempts failed: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
    #[error("non-retryable failure: {0}")]
    Permanent(E),
}

/// Nominal (pre-jitter) backoff delay after the given 1-based attempt.
///
/// The schedule is non-decreasing and each step grows by at most
/// `backoff_multiplier` over the previous one, capped at `max_backoff`.
pub fn nominal_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let millis = config.base_backoff.as_millis() as f64
        * config.backoff_multiplier.powi(exponent as i32);
    Duration::from_millis(millis.min(config.max_backoff.as_millis() as f64) as u64)
}

fn apply_jitter(nominal: Duration, jitter: bool) -> Duration {
    if !jitter {
        return nominal;
    }
    let ceiling = (nominal.as_millis() as u64).max(1);
    Duration::from_millis(rand::thread_rng().gen_range(1..=ceiling))
}

/// Execute a fallible future with retry logic.
///
/// `is_retryable` decides whether a given error is worth another attempt;
/// a non-retryable error short-circuits the loop immediately. When a
/// `CancellationToken` is supplied, cancellation is honored between
/// attempts: the attempt currently in flight always runs to completion,
/// but no further attempt is scheduled afterwards.
pub async fn with_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    cancel: Option<&CancellationToken>,
    is_retryable: P,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(RetryError::Permanent(err)),
            Err(err) => {
                if attempt >= config.max_attempts {
                    warn!("giving up after {} attempts: {}", attempt, err);
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = apply_jitter(nominal_backoff(config, attempt), config.jitter);
                warn!(
                    "attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, config.max_attempts, err, delay
                );

                match cancel {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                return Err(RetryError::Cancelled { attempts: attempt });
                            }
                            _ = sleep(delay) => {}
                        }
                    }
                    None => sleep(delay).await,
                }
            }
        }
    }
}

//! Dispatcher
//!
//! Resolves a target's current channel in the directory and attempts
//! delivery, absorbing transient failures with retry/backoff and a
//! per-attempt deadline. Every outcome is reported as an explicit
//! `DeliveryResult`; nothing is fire-and-forget.

use chrono::Utc;
use resilience::{with_retry, with_timeout, RetryConfig, RetryError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::ChannelError;
use crate::directory::{DeviceDirectory, RouteStatus};
use crate::metrics;
use crate::models::{DeliveryResult, NotificationRequest};

pub struct Dispatcher {
    directory: DeviceDirectory,
    retry: RetryConfig,
    attempt_timeout: Duration,
}

impl Dispatcher {
    pub fn new(directory: DeviceDirectory, retry: RetryConfig, attempt_timeout: Duration) -> Self {
        Self {
            directory,
            retry,
            attempt_timeout,
        }
    }

    /// Route one notification to its target.
    pub async fn dispatch(&self, request: &NotificationRequest) -> DeliveryResult {
        self.dispatch_with_cancel(request, None).await
    }

    /// Route one notification, honoring cancellation between attempts: an
    /// attempt already in flight runs to completion, but no further retry
    /// is scheduled after the token fires.
    pub async fn dispatch_with_cancel(
        &self,
        request: &NotificationRequest,
        cancel: Option<&CancellationToken>,
    ) -> DeliveryResult {
        // Snapshot the channel handle and release the directory lock
        // before any delivery I/O; backoff waits must not stall
        // unrelated directory operations.
        let channel = match self.directory.route(&request.target_id).await {
            RouteStatus::Unknown => {
                debug!(target_id = %request.target_id, "dispatch target unknown");
                return self.finish(DeliveryResult::UnknownTarget);
            }
            RouteStatus::Unreachable => {
                debug!(target_id = %request.target_id, "dispatch target unreachable");
                return self.finish(DeliveryResult::Unreachable);
            }
            RouteStatus::Ready(channel) => channel,
        };

        let payload = request.payload();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempt_timeout = self.attempt_timeout;

        let outcome = with_retry(
            &self.retry,
            cancel,
            |err: &ChannelError| err.is_transient(),
            || {
                let channel = Arc::clone(&channel);
                let payload = payload.clone();
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    match with_timeout(attempt_timeout, channel.send(&payload)).await {
                        Ok(send_result) => send_result,
                        // A blown deadline counts as a transient failure.
                        Err(_) => Err(ChannelError::Transient(format!(
                            "delivery attempt timed out after {attempt_timeout:?}"
                        ))),
                    }
                }
            },
        )
        .await;

        let attempts_made = attempts.load(Ordering::SeqCst);

        let result = match outcome {
            Ok(()) => {
                debug!(
                    target_id = %request.target_id,
                    channel = channel.kind(),
                    attempts = attempts_made,
                    "notification delivered"
                );
                DeliveryResult::Delivered {
                    delivered_at: Utc::now(),
                }
            }
            Err(RetryError::Permanent(err)) => {
                warn!(
                    target_id = %request.target_id,
                    channel = channel.kind(),
                    "terminal channel failure: {}", err
                );
                // Demote immediately, independent of the sweep schedule;
                // a concurrent re-registration with a fresh channel wins.
                self.directory
                    .demote_if_channel(&request.target_id, &channel)
                    .await;
                DeliveryResult::DeliveryFailed {
                    attempts: attempts_made,
                }
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                warn!(
                    target_id = %request.target_id,
                    channel = channel.kind(),
                    attempts,
                    "delivery retries exhausted"
                );
                DeliveryResult::DeliveryFailed { attempts }
            }
            Err(RetryError::Cancelled { attempts }) => {
                debug!(target_id = %request.target_id, attempts, "dispatch cancelled by caller");
                DeliveryResult::DeliveryFailed { attempts }
            }
        };

        self.finish(result)
    }

    fn finish(&self, result: DeliveryResult) -> DeliveryResult {
        metrics::record_dispatch(result.as_str());
        result
    }
}

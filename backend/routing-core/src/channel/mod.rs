//! Delivery channel abstraction.
//!
//! A channel is the live delivery path to one device instance. Variants
//! correspond to different push transports; the routing core only cares
//! about SEND and whether a failure is worth retrying.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::NotificationPayload;

/// How a delivery attempt failed
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// Momentary condition (channel busy, deadline blown); safe to retry
    #[error("transient channel failure: {0}")]
    Transient(String),

    /// The channel reports it is permanently unusable (e.g. the device
    /// unregistered upstream); never retried
    #[error("terminal channel failure: {0}")]
    Terminal(String),
}

impl ChannelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Transient(_))
    }
}

/// A live delivery path to a specific device instance
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Transport identifier for logging ("local", "fcm", "apns", ...)
    fn kind(&self) -> &str;

    /// Hand the payload to the transport. Must not assume the directory
    /// lock is held; implementations are free to block on I/O.
    async fn send(&self, payload: &NotificationPayload) -> Result<(), ChannelError>;
}

/// Type alias for the sender half backing a local channel
pub type LocalSender = mpsc::UnboundedSender<NotificationPayload>;

/// In-process channel backed by an unbounded mpsc sender.
///
/// This is the delivery path for devices connected directly to this
/// process (e.g. over a held-open socket owned by the transport layer).
/// A dropped receiver means the device connection is gone for good, so
/// that surfaces as a terminal failure.
pub struct LocalChannel {
    sender: LocalSender,
}

impl LocalChannel {
    pub fn new(sender: LocalSender) -> Self {
        Self { sender }
    }

    /// Build a channel plus the receiver half, for embedding and tests.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<NotificationPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl DeliveryChannel for LocalChannel {
    fn kind(&self) -> &str {
        "local"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), ChannelError> {
        self.sender
            .send(payload.clone())
            .map_err(|_| ChannelError::Terminal("peer connection closed".to_string()))
    }
}

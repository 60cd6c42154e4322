use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived liveness status of a registered device
///
/// Never stored as a source of truth: a record is `Stale` when its
/// last-seen timestamp has fallen behind the stale threshold, or when a
/// terminal channel failure (or the sweep) demoted it. Registration and
/// heartbeat always reset it to `Active`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    /// Recently seen; channel (if present) is assumed usable
    Active,
    /// Liveness lapsed; channel is considered unusable
    Stale,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Stale => "stale",
        }
    }
}

/// Point-in-time snapshot of a directory entry
///
/// The live channel handle stays inside the directory; the snapshot only
/// reports whether one is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Opaque client-assigned identifier, unique across the directory
    pub id: String,

    /// Opaque attributes (platform, app version, ...), unvalidated
    pub metadata: serde_json::Value,

    /// Derived liveness status at snapshot time
    pub status: DeviceStatus,

    /// Whether a live delivery channel is attached
    pub has_channel: bool,

    /// Wall-clock time of the last registration or heartbeat
    pub last_seen_at: DateTime<Utc>,

    /// Wall-clock time of the first registration
    pub registered_at: DateTime<Utc>,
}

/// A request to route one notification to a registered device
///
/// Ephemeral and never persisted. Callers submit it once; retries are the
/// dispatcher's responsibility, not re-submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub target_id: String,
    pub sender_id: String,
    pub title: String,
    pub body: String,
}

impl NotificationRequest {
    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            sender_id: self.sender_id.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }
}

/// What actually travels down a delivery channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPayload {
    pub sender_id: String,
    pub title: String,
    pub body: String,
}

/// Outcome of a dispatch call; every variant must be handled by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryResult {
    /// Target id was never registered (or already evicted); not retried
    UnknownTarget,
    /// Target is known but stale or has no channel; not retried, the
    /// target must re-register before delivery can succeed
    Unreachable,
    /// The channel accepted the payload
    Delivered { delivered_at: DateTime<Utc> },
    /// Retries exhausted, or the channel failed terminally, or the caller
    /// cancelled before retries completed
    DeliveryFailed { attempts: u32 },
}

impl DeliveryResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryResult::UnknownTarget => "unknown_target",
            DeliveryResult::Unreachable => "unreachable",
            DeliveryResult::Delivered { .. } => "delivered",
            DeliveryResult::DeliveryFailed { .. } => "delivery_failed",
        }
    }
}

/// Result of a single upsert into the directory
///
/// `persisted` is false when the metadata store was unavailable; the
/// in-memory registration still took effect (degraded durability is
/// preferred over rejecting live traffic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub record: DeviceRecord,
    pub persisted: bool,
}

/// Response to a registration, mirroring what the gateway reports back:
/// the admitted record plus the ids currently active, in insertion order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationAck {
    pub record: DeviceRecord,
    pub active_ids: Vec<String>,
    pub persisted: bool,
}

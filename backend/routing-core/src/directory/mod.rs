//! Device Directory
//!
//! In-memory mapping from device id to connection state (channel handle,
//! last-seen time, derived liveness). Backed by the external metadata
//! store for durability but authoritative for liveness.
//!
//! Thread-safe via a single `Arc<RwLock<..>>` guarding the map and its
//! insertion-order index together, so a reader never observes a record
//! mid-update: a registration's metadata, channel and last-seen fields
//! commit as one unit under the write lock.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::DeliveryChannel;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{DeviceRecord, DeviceStatus, UpsertOutcome};
use crate::store::MetadataStore;

/// One directory entry. The channel handle is owned exclusively here.
struct DeviceEntry {
    metadata: Value,
    channel: Option<Arc<dyn DeliveryChannel>>,
    /// Monotonic last-seen, authoritative for staleness math
    last_seen: Instant,
    /// Wall-clock shadow of `last_seen`, for reporting only
    last_seen_at: DateTime<Utc>,
    registered_at: DateTime<Utc>,
    /// Set by the sweep or a terminal channel failure; cleared by any
    /// registration or heartbeat
    demoted: bool,
}

impl DeviceEntry {
    fn status(&self, now: Instant, stale_threshold: Duration) -> DeviceStatus {
        if self.demoted || now.duration_since(self.last_seen) > stale_threshold {
            DeviceStatus::Stale
        } else {
            DeviceStatus::Active
        }
    }

    fn snapshot(&self, id: &str, now: Instant, stale_threshold: Duration) -> DeviceRecord {
        DeviceRecord {
            id: id.to_string(),
            metadata: self.metadata.clone(),
            status: self.status(now, stale_threshold),
            has_channel: self.channel.is_some(),
            last_seen_at: self.last_seen_at,
            registered_at: self.registered_at,
        }
    }
}

struct DirectoryInner {
    entries: HashMap<String, DeviceEntry>,
    /// Registration order of the ids currently present
    order: Vec<String>,
}

/// What one sweep pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub checked: usize,
    pub demoted: usize,
    pub evicted: usize,
}

/// How the dispatcher sees a target at resolution time
pub(crate) enum RouteStatus {
    Unknown,
    Unreachable,
    Ready(Arc<dyn DeliveryChannel>),
}

/// Directory of live device endpoints.
///
/// Explicitly owned and passed by handle to the dispatcher and the
/// liveness monitor; independent instances stay fully isolated.
#[derive(Clone)]
pub struct DeviceDirectory {
    inner: Arc<RwLock<DirectoryInner>>,
    store: Arc<dyn MetadataStore>,
    stale_threshold: Duration,
    hard_expiry: Duration,
}

impl DeviceDirectory {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        stale_threshold: Duration,
        hard_expiry: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DirectoryInner {
                entries: HashMap::new(),
                order: Vec::new(),
            })),
            store,
            stale_threshold,
            hard_expiry,
        }
    }

    /// Create or refresh a record. Always succeeds in memory: sets
    /// last-seen to now, attaches the channel and clears any demotion.
    ///
    /// Metadata is persisted to the external store best-effort after the
    /// in-memory commit; a store failure is reported via
    /// `UpsertOutcome::persisted`, never as an error.
    pub async fn upsert(
        &self,
        id: &str,
        metadata: Value,
        channel: Arc<dyn DeliveryChannel>,
    ) -> UpsertOutcome {
        let now = Instant::now();
        let wall_now = Utc::now();

        let record = {
            let mut inner = self.inner.write().await;

            match inner.entries.get_mut(id) {
                Some(entry) => {
                    entry.metadata = metadata.clone();
                    entry.channel = Some(channel);
                    entry.last_seen = now;
                    entry.last_seen_at = wall_now;
                    entry.demoted = false;
                }
                None => {
                    inner.entries.insert(
                        id.to_string(),
                        DeviceEntry {
                            metadata: metadata.clone(),
                            channel: Some(channel),
                            last_seen: now,
                            last_seen_at: wall_now,
                            registered_at: wall_now,
                            demoted: false,
                        },
                    );
                    inner.order.push(id.to_string());
                }
            }

            // Entry is guaranteed present at this point.
            inner.entries[id].snapshot(id, now, self.stale_threshold)
        };

        let persisted = match self.store.put(id, &metadata).await {
            Ok(()) => true,
            Err(e) => {
                warn!(device_id = %id, "metadata store put failed, registration kept in memory: {}", e);
                metrics::record_store_degraded("put");
                false
            }
        };

        UpsertOutcome { record, persisted }
    }

    /// Refresh last-seen without touching metadata or channel.
    pub async fn heartbeat(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.entries.get_mut(id) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                entry.last_seen_at = Utc::now();
                entry.demoted = false;
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    /// Snapshot of one record, with status derived lazily at call time.
    pub async fn lookup(&self, id: &str) -> Option<DeviceRecord> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        inner
            .entries
            .get(id)
            .map(|entry| entry.snapshot(id, now, self.stale_threshold))
    }

    /// Point-in-time copy of the ids with status ACTIVE, in insertion
    /// order. Safe to iterate while concurrent mutations occur.
    pub async fn list_active(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .entries
                    .get(*id)
                    .map(|e| e.status(now, self.stale_threshold) == DeviceStatus::Active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Deregister. Returns whether a record existed.
    pub async fn remove(&self, id: &str) -> bool {
        let existed = {
            let mut inner = self.inner.write().await;
            let existed = inner.entries.remove(id).is_some();
            if existed {
                inner.order.retain(|entry_id| entry_id != id);
            }
            existed
        };

        if existed {
            if let Err(e) = self.store.delete(id).await {
                warn!(device_id = %id, "metadata store delete failed: {}", e);
                metrics::record_store_degraded("delete");
            }
            info!(device_id = %id, "device deregistered");
        }

        existed
    }

    /// Resolve a dispatch target in one read-locked pass: existence,
    /// derived status and a clone of the channel handle together, so the
    /// dispatcher never holds the lock across delivery I/O.
    pub(crate) async fn route(&self, id: &str) -> RouteStatus {
        let inner = self.inner.read().await;
        let now = Instant::now();

        match inner.entries.get(id) {
            None => RouteStatus::Unknown,
            Some(entry) => {
                if entry.status(now, self.stale_threshold) == DeviceStatus::Stale {
                    return RouteStatus::Unreachable;
                }
                match &entry.channel {
                    Some(channel) => RouteStatus::Ready(Arc::clone(channel)),
                    None => RouteStatus::Unreachable,
                }
            }
        }
    }

    /// Demote a record after a terminal channel failure: mark stale and
    /// drop the handle, independent of the sweep schedule.
    ///
    /// Only applies while the failed channel is still the attached one;
    /// if the device re-registered concurrently the fresh channel wins.
    pub(crate) async fn demote_if_channel(&self, id: &str, failed: &Arc<dyn DeliveryChannel>) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.get_mut(id) {
            let same_channel = entry
                .channel
                .as_ref()
                .map(|current| Arc::ptr_eq(current, failed))
                .unwrap_or(false);
            if same_channel {
                entry.demoted = true;
                entry.channel = None;
                metrics::record_demotion("terminal");
                info!(device_id = %id, "device demoted after terminal channel failure");
            }
        }
    }

    /// One liveness pass: demote records past the stale threshold and
    /// evict records past hard expiry. Staleness is re-checked under the
    /// write lock at mutation time, so a concurrently refreshed record is
    /// never demoted on the basis of an old scan.
    pub async fn sweep(&self) -> SweepStats {
        let now = Instant::now();
        let mut stats = SweepStats::default();
        let mut evicted_ids = Vec::new();

        {
            let mut inner = self.inner.write().await;
            stats.checked = inner.entries.len();

            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.last_seen) > self.hard_expiry)
                .map(|(id, _)| id.clone())
                .collect();

            for id in expired {
                inner.entries.remove(&id);
                inner.order.retain(|entry_id| entry_id != &id);
                evicted_ids.push(id);
                stats.evicted += 1;
            }

            for (id, entry) in inner.entries.iter_mut() {
                if !entry.demoted
                    && now.duration_since(entry.last_seen) > self.stale_threshold
                {
                    entry.demoted = true;
                    entry.channel = None;
                    stats.demoted += 1;
                    metrics::record_demotion("stale");
                    debug!(device_id = %id, "device demoted to stale by sweep");
                }
            }
        }

        for id in &evicted_ids {
            if let Err(e) = self.store.delete(id).await {
                warn!(device_id = %id, "metadata store delete failed during eviction: {}", e);
                metrics::record_store_degraded("delete");
            }
            info!(device_id = %id, "device evicted after hard expiry");
        }

        stats
    }

    /// Total records currently held (active and stale).
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

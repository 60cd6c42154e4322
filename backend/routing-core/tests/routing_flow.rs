//! End-to-end flows through the routing service: registration, liveness,
//! dispatch outcomes, retry behavior and degraded-store handling.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use routing_core::{
    ChannelError, Config, DeliveryChannel, DeliveryResult, DeviceStatus, InMemoryStore,
    LocalChannel, MetadataStore, NotificationPayload, NotificationRequest, RoutingService,
    StoreError,
};

/// Channel that fails every send with a transient error, counting attempts.
struct BusyChannel {
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl DeliveryChannel for BusyChannel {
    fn kind(&self) -> &str {
        "busy"
    }

    async fn send(&self, _payload: &NotificationPayload) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ChannelError::Transient("channel momentarily busy".to_string()))
    }
}

/// Channel that reports itself permanently closed on the first send.
struct ClosedChannel;

#[async_trait]
impl DeliveryChannel for ClosedChannel {
    fn kind(&self) -> &str {
        "closed"
    }

    async fn send(&self, _payload: &NotificationPayload) -> Result<(), ChannelError> {
        Err(ChannelError::Terminal("device unregistered upstream".to_string()))
    }
}

/// Channel that never completes a send within the attempt deadline.
struct StuckChannel {
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl DeliveryChannel for StuckChannel {
    fn kind(&self) -> &str {
        "stuck"
    }

    async fn send(&self, _payload: &NotificationPayload) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Store that fails every call.
struct OfflineStore;

#[async_trait]
impl MetadataStore for OfflineStore {
    async fn put(&self, _id: &str, _metadata: &serde_json::Value) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    async fn get(&self, _id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("routing_core=debug")
        .try_init();
}

fn service() -> RoutingService {
    RoutingService::new(Arc::new(InMemoryStore::new()), Config::default())
}

#[tokio::test(start_paused = true)]
async fn register_dispatch_then_go_stale() {
    init_tracing();
    let service = service();

    // register("d1", {platform: ios}, chanA) -> ListActive includes d1
    let (chan_a, mut rx) = LocalChannel::pair();
    let ack = service
        .register("d1", json!({"platform": "ios"}), Arc::new(chan_a))
        .await;
    assert!(ack.active_ids.contains(&"d1".to_string()));
    assert_eq!(ack.record.status, DeviceStatus::Active);

    // dispatch to d1 -> DELIVERED, payload arrives on chanA
    let result = service.dispatch("d1", "s1", "Hi", "body").await;
    assert!(matches!(result, DeliveryResult::Delivered { .. }));
    let payload = rx.recv().await.unwrap();
    assert_eq!(payload.sender_id, "s1");
    assert_eq!(payload.title, "Hi");

    // Advance past the stale threshold without a heartbeat.
    tokio::time::advance(Duration::from_secs(121)).await;

    let record = service.directory().lookup("d1").await.unwrap();
    assert_eq!(record.status, DeviceStatus::Stale);

    // Dispatch now fails without any send attempt.
    let result = service.dispatch("d1", "s1", "Hi", "body").await;
    assert_eq!(result, DeliveryResult::Unreachable);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn dispatch_to_unknown_target() {
    let service = service();

    let result = service.dispatch("ghost", "s1", "Hi", "body").await;
    assert_eq!(result, DeliveryResult::UnknownTarget);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_exactly_three_attempts() {
    let service = service();

    let attempts = Arc::new(AtomicU32::new(0));
    service
        .register(
            "d2",
            json!({"platform": "android"}),
            Arc::new(BusyChannel {
                attempts: attempts.clone(),
            }),
        )
        .await;

    let result = service.dispatch("d2", "s1", "Hi", "body").await;

    assert_eq!(result, DeliveryResult::DeliveryFailed { attempts: 3 });
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn attempt_deadline_counts_as_transient() {
    let service = service();

    let attempts = Arc::new(AtomicU32::new(0));
    service
        .register(
            "d3",
            json!({}),
            Arc::new(StuckChannel {
                attempts: attempts.clone(),
            }),
        )
        .await;

    let result = service.dispatch("d3", "s1", "Hi", "body").await;

    // Every attempt blew the 5s deadline; all three ran.
    assert_eq!(result, DeliveryResult::DeliveryFailed { attempts: 3 });
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn terminal_failure_demotes_immediately() {
    init_tracing();
    let service = service();

    service
        .register("d4", json!({}), Arc::new(ClosedChannel))
        .await;

    let result = service.dispatch("d4", "s1", "Hi", "body").await;
    assert_eq!(result, DeliveryResult::DeliveryFailed { attempts: 1 });

    // Demoted without waiting for the sweep: stale, channel gone.
    let record = service.directory().lookup("d4").await.unwrap();
    assert_eq!(record.status, DeviceStatus::Stale);
    assert!(!record.has_channel);

    // A second dispatch is now short-circuited before any send.
    let result = service.dispatch("d4", "s1", "Hi", "body").await;
    assert_eq!(result, DeliveryResult::Unreachable);
}

#[tokio::test(start_paused = true)]
async fn delivery_does_not_refresh_liveness() {
    let service = service();

    let (chan, _rx) = LocalChannel::pair();
    service.register("d5", json!({}), Arc::new(chan)).await;

    // Deliver late in the staleness window.
    tokio::time::advance(Duration::from_secs(100)).await;
    let result = service.dispatch("d5", "s1", "Hi", "body").await;
    assert!(matches!(result, DeliveryResult::Delivered { .. }));

    // Liveness is driven by heartbeats only; the delivery above must not
    // have pushed the record back to the start of the window.
    tokio::time::advance(Duration::from_secs(21)).await;
    let record = service.directory().lookup("d5").await.unwrap();
    assert_eq!(record.status, DeviceStatus::Stale);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_retries_after_inflight_attempt() {
    let service = service();

    let attempts = Arc::new(AtomicU32::new(0));
    service
        .register(
            "d6",
            json!({}),
            Arc::new(BusyChannel {
                attempts: attempts.clone(),
            }),
        )
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let request = NotificationRequest {
        target_id: "d6".to_string(),
        sender_id: "s1".to_string(),
        title: "Hi".to_string(),
        body: "body".to_string(),
    };
    let result = service.dispatch_with_cancel(&request, &token).await;

    assert_eq!(result, DeliveryResult::DeliveryFailed { attempts: 1 });
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn re_registration_revives_a_stale_device() {
    let service = service();

    let (chan_a, _rx_a) = LocalChannel::pair();
    service.register("d7", json!({}), Arc::new(chan_a)).await;

    tokio::time::advance(Duration::from_secs(121)).await;
    assert_eq!(
        service.directory().lookup("d7").await.unwrap().status,
        DeviceStatus::Stale
    );

    let (chan_b, mut rx_b) = LocalChannel::pair();
    let ack = service.register("d7", json!({}), Arc::new(chan_b)).await;
    assert_eq!(ack.record.status, DeviceStatus::Active);

    let result = service.dispatch("d7", "s1", "back", "again").await;
    assert!(matches!(result, DeliveryResult::Delivered { .. }));
    assert_eq!(rx_b.recv().await.unwrap().title, "back");
}

#[tokio::test]
async fn registration_survives_store_outage() {
    let service = RoutingService::new(Arc::new(OfflineStore), Config::default());

    let (chan, mut rx) = LocalChannel::pair();
    let ack = service
        .register("d8", json!({"platform": "ios"}), Arc::new(chan))
        .await;

    // Degraded durability, not an error: the record is live and routable.
    assert!(!ack.persisted);
    assert_eq!(ack.active_ids, vec!["d8".to_string()]);

    let result = service.dispatch("d8", "s1", "Hi", "body").await;
    assert!(matches!(result, DeliveryResult::Delivered { .. }));
    assert!(rx.recv().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn hard_expiry_evicts_via_monitor() {
    let service = service();

    let (chan, _rx) = LocalChannel::pair();
    service.register("d9", json!({}), Arc::new(chan)).await;

    let cancel = CancellationToken::new();
    let handle = service.spawn_monitor(cancel.clone());
    // Let the spawned task install its interval before moving time.
    tokio::task::yield_now().await;

    tokio::time::advance(Duration::from_secs(86_401)).await;
    // Let the monitor tick past the expiry boundary.
    tokio::time::advance(Duration::from_secs(31)).await;
    tokio::task::yield_now().await;

    assert!(service.directory().lookup("d9").await.is_none());

    cancel.cancel();
    handle.await.unwrap();
}

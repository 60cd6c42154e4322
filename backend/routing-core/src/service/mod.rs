//! Registration gateway and operation surface.
//!
//! Thin orchestration over the directory and the dispatcher. This is the
//! transport-agnostic surface an HTTP/JSON (or RPC) binding would call
//! into; framing and body validation live in that external layer.

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::channel::DeliveryChannel;
use crate::config::Config;
use crate::directory::DeviceDirectory;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::metrics;
use crate::models::{DeliveryResult, NotificationRequest, RegistrationAck};
use crate::monitor::LivenessMonitor;
use crate::store::MetadataStore;

pub struct RoutingService {
    directory: DeviceDirectory,
    dispatcher: Dispatcher,
    config: Config,
}

impl RoutingService {
    pub fn new(store: Arc<dyn MetadataStore>, config: Config) -> Self {
        let directory = DeviceDirectory::new(
            store,
            config.stale_threshold(),
            config.hard_expiry(),
        );
        let dispatcher = Dispatcher::new(
            directory.clone(),
            config.retry(),
            config.attempt_timeout(),
        );
        Self {
            directory,
            dispatcher,
            config,
        }
    }

    /// Admit a registration: create or refresh the record, attach the
    /// channel, and report the currently active ids in insertion order.
    pub async fn register(
        &self,
        id: &str,
        metadata: Value,
        channel: Arc<dyn DeliveryChannel>,
    ) -> RegistrationAck {
        let outcome = self.directory.upsert(id, metadata, channel).await;
        let active_ids = self.directory.list_active().await;

        metrics::record_registration("register");
        info!(device_id = %id, persisted = outcome.persisted, "device registered");

        RegistrationAck {
            record: outcome.record,
            active_ids,
            persisted: outcome.persisted,
        }
    }

    /// Refresh liveness for an already-registered device.
    pub async fn heartbeat(&self, id: &str) -> Result<()> {
        self.directory.heartbeat(id).await?;
        metrics::record_registration("heartbeat");
        Ok(())
    }

    /// Deregister. Returns whether a record existed.
    pub async fn deregister(&self, id: &str) -> bool {
        self.directory.remove(id).await
    }

    /// Route one notification to its target.
    pub async fn dispatch(
        &self,
        target_id: &str,
        sender_id: &str,
        title: &str,
        body: &str,
    ) -> DeliveryResult {
        let request = NotificationRequest {
            target_id: target_id.to_string(),
            sender_id: sender_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        };
        self.dispatcher.dispatch(&request).await
    }

    /// Like `dispatch`, honoring cancellation between retry attempts.
    pub async fn dispatch_with_cancel(
        &self,
        request: &NotificationRequest,
        cancel: &CancellationToken,
    ) -> DeliveryResult {
        self.dispatcher.dispatch_with_cancel(request, Some(cancel)).await
    }

    /// Spawn the liveness monitor on this service's directory.
    pub fn spawn_monitor(&self, cancel: CancellationToken) -> JoinHandle<()> {
        LivenessMonitor::new(self.directory.clone(), self.config.sweep_interval())
            .spawn(cancel)
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }
}

//! Device-notification routing core.
//!
//! A registry of live device endpoints plus a dispatcher that hands
//! notifications to a target device's current delivery channel, detects
//! stale devices, and degrades gracefully under partial failure. The
//! directory is authoritative for liveness; an external key-value store
//! carries metadata for durability, best-effort.

pub mod channel;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod service;
pub mod store;

pub use channel::{ChannelError, DeliveryChannel, LocalChannel};
pub use config::Config;
pub use directory::{DeviceDirectory, SweepStats};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use models::{
    DeliveryResult, DeviceRecord, DeviceStatus, NotificationPayload, NotificationRequest,
    RegistrationAck, UpsertOutcome,
};
pub use monitor::LivenessMonitor;
pub use service::RoutingService;
pub use store::{InMemoryStore, MetadataStore, StoreError};

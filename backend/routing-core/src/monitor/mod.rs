//! Liveness Monitor
//!
//! Periodic background task sweeping the directory: demotes records past
//! the stale threshold (dropping their channel handle) and evicts records
//! past hard expiry. Expiry is sweep-driven only; staleness is also
//! derived lazily by the directory on every lookup, so the sweep is an
//! eviction mechanism, not the source of truth.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::directory::{DeviceDirectory, SweepStats};
use crate::metrics;

pub struct LivenessMonitor {
    directory: DeviceDirectory,
    sweep_interval: Duration,
}

impl LivenessMonitor {
    pub fn new(directory: DeviceDirectory, sweep_interval: Duration) -> Self {
        Self {
            directory,
            sweep_interval,
        }
    }

    /// Run one sweep pass. Exposed for deterministic tests and for
    /// embedders that drive their own schedule.
    pub async fn sweep_once(&self) -> SweepStats {
        let stats = self.directory.sweep().await;
        metrics::record_sweep(&stats);

        if stats.demoted > 0 || stats.evicted > 0 {
            info!(
                checked = stats.checked,
                demoted = stats.demoted,
                evicted = stats.evicted,
                "liveness sweep complete"
            );
        } else {
            debug!(checked = stats.checked, "liveness sweep complete, no changes");
        }

        stats
    }

    /// Spawn the periodic sweep loop. The task runs until the token is
    /// cancelled; a sweep in progress finishes before the task exits.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;

            info!(interval = ?self.sweep_interval, "liveness monitor started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("liveness monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
        })
    }
}

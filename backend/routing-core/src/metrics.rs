//! Prometheus metrics for the routing core
//!
//! Tracks registrations, dispatch outcomes, liveness sweeps and store
//! degradation. Registered on the default registry; the embedding
//! transport layer decides how to expose them.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

use crate::directory::SweepStats;

/// Total device registrations and heartbeats admitted
static REGISTRATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "routing_core_registrations_total",
        "Total registrations and heartbeats admitted by the gateway",
        &["kind"]
    )
    .expect("failed to register routing_core_registrations_total")
});

/// Dispatch outcomes by result tag
static DISPATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "routing_core_dispatches_total",
        "Dispatch outcomes by delivery result",
        &["result"]
    )
    .expect("failed to register routing_core_dispatches_total")
});

/// Records demoted to stale, by reason (sweep threshold vs terminal failure)
static DEMOTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "routing_core_demotions_total",
        "Device records demoted to stale, by reason",
        &["reason"]
    )
    .expect("failed to register routing_core_demotions_total")
});

/// Liveness sweep passes completed
static SWEEP_RUNS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "routing_core_sweep_runs_total",
        "Total liveness sweep passes completed"
    )
    .expect("failed to register routing_core_sweep_runs_total")
});

/// Records evicted after hard expiry
static EVICTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "routing_core_evictions_total",
        "Device records evicted after hard expiry"
    )
    .expect("failed to register routing_core_evictions_total")
});

/// Records checked in the last sweep pass
static SWEEP_CHECKED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "routing_core_sweep_checked",
        "Number of records checked in the last sweep pass"
    )
    .expect("failed to register routing_core_sweep_checked")
});

/// Best-effort store operations that failed (registration continued)
static STORE_DEGRADED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "routing_core_store_degraded_total",
        "Metadata store operations that failed best-effort",
        &["operation"]
    )
    .expect("failed to register routing_core_store_degraded_total")
});

pub fn record_registration(kind: &str) {
    REGISTRATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_dispatch(result: &str) {
    DISPATCHES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_demotion(reason: &str) {
    DEMOTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_store_degraded(operation: &str) {
    STORE_DEGRADED_TOTAL.with_label_values(&[operation]).inc();
}

pub fn record_sweep(stats: &SweepStats) {
    SWEEP_RUNS_TOTAL.inc();
    SWEEP_CHECKED.set(stats.checked as i64);
    if stats.evicted > 0 {
        EVICTIONS_TOTAL.inc_by(stats.evicted as u64);
    }
}

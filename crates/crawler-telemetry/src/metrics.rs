//! Prometheus metrics for the crawler pipeline.
//!
//! All metrics follow the naming convention: `crawler_<component>_<metric>_<unit>`
//!
//! Metrics can be updated before [`register_metrics`] runs; they are only
//! exported once registered.

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CRAWLING ENGINE
    // =========================================================================

    /// Probes by outcome (ok, timeout, refused, unreachable, rejected, ...)
    pub static ref PROBES: IntCounterVec = IntCounterVec::new(
        Opts::new("crawler_engine_probes_total", "Probe attempts by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Records appended to the transient store
    pub static ref RECORDS_APPENDED: IntCounter = IntCounter::new(
        "crawler_engine_records_appended_total",
        "Records appended to the transient store"
    ).expect("metric creation failed");

    // =========================================================================
    // SYNCHRONIZATION DAEMON
    // =========================================================================

    /// Records moved into the serving store
    pub static ref RECORDS_TRANSFERRED: IntCounter = IntCounter::new(
        "crawler_sync_records_transferred_total",
        "Records transferred from the transient to the serving store"
    ).expect("metric creation failed");

    /// Failed synchronization cycles by cause (contention, serving, transient)
    pub static ref SYNC_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("crawler_sync_failures_total", "Failed synchronization cycles"),
        &["cause"]
    ).expect("metric creation failed");

    /// Current retry delay after consecutive failures
    pub static ref BACKOFF_SECONDS: Gauge = Gauge::new(
        "crawler_sync_backoff_seconds",
        "Current synchronization retry delay"
    ).expect("metric creation failed");

    // =========================================================================
    // SERVING STORE / EVICTION
    // =========================================================================

    /// Records removed by eviction
    pub static ref RECORDS_EVICTED: IntCounter = IntCounter::new(
        "crawler_eviction_records_evicted_total",
        "Records evicted from the serving store"
    ).expect("metric creation failed");

    /// Records currently in the serving store
    pub static ref SERVING_RECORDS: IntGauge = IntGauge::new(
        "crawler_serving_records",
        "Records currently in the serving store"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Registering twice is an error.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PROBES.clone()),
        Box::new(RECORDS_APPENDED.clone()),
        Box::new(RECORDS_TRANSFERRED.clone()),
        Box::new(SYNC_FAILURES.clone()),
        Box::new(BACKOFF_SECONDS.clone()),
        Box::new(RECORDS_EVICTED.clone()),
        Box::new(SERVING_RECORDS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// Encode all registered metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

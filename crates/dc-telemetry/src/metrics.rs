//! Prometheus metrics for the controller.
//!
//! Exported on whatever surface the embedding process chooses via
//! [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BUS CONNECTIONS
    // =========================================================================

    /// 1 for each bus with an open connection, 0 otherwise
    pub static ref BUS_CONNECTIONS_AVAILABLE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("dc_bus_connections_available", "Bus connections open in the pool"),
        &["bus"]
    ).expect("metric creation failed");

    /// Match rule registration failures
    pub static ref BUS_MATCH_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("dc_bus_match_errors_total", "Failed AddMatch/RemoveMatch calls"),
        &["operation"]
    ).expect("metric creation failed");

    // =========================================================================
    // SIGNAL SUBSCRIPTIONS
    // =========================================================================

    /// Subscriptions currently Active
    pub static ref SIGNAL_SUBSCRIPTIONS_ACTIVE: IntGauge = IntGauge::new(
        "dc_signal_subscriptions_active",
        "Active signal subscriptions"
    ).expect("metric creation failed");

    /// Events written into delivery queues
    pub static ref SIGNAL_EVENTS_DELIVERED: IntCounter = IntCounter::new(
        "dc_signal_events_delivered_total",
        "Signal events delivered to subscription queues"
    ).expect("metric creation failed");

    /// Events discarded because a delivery queue was full
    pub static ref SIGNAL_EVENTS_DROPPED: IntCounter = IntCounter::new(
        "dc_signal_events_dropped_total",
        "Signal events dropped on full delivery queues"
    ).expect("metric creation failed");

    /// Events a dispatcher missed because it fell behind the bus feed
    pub static ref SIGNAL_FEED_LAGGED: IntCounter = IntCounter::new(
        "dc_signal_feed_lagged_total",
        "Signal events skipped by lagging dispatchers"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BUS_CONNECTIONS_AVAILABLE.clone()),
        Box::new(BUS_MATCH_ERRORS.clone()),
        Box::new(SIGNAL_SUBSCRIPTIONS_ACTIVE.clone()),
        Box::new(SIGNAL_EVENTS_DELIVERED.clone()),
        Box::new(SIGNAL_EVENTS_DROPPED.clone()),
        Box::new(SIGNAL_FEED_LAGGED.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode the registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

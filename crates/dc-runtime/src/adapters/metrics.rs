//! Signal hub instrumentation backed by the global Prometheus registry.

use dc_02_signal_hub::SignalMetrics;
use dc_telemetry::metrics::{
    BUS_MATCH_ERRORS, SIGNAL_EVENTS_DELIVERED, SIGNAL_EVENTS_DROPPED, SIGNAL_FEED_LAGGED,
    SIGNAL_SUBSCRIPTIONS_ACTIVE,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusSignalMetrics;

impl SignalMetrics for PrometheusSignalMetrics {
    fn subscription_opened(&self) {
        SIGNAL_SUBSCRIPTIONS_ACTIVE.inc();
    }

    fn subscription_closed(&self) {
        SIGNAL_SUBSCRIPTIONS_ACTIVE.dec();
    }

    fn event_delivered(&self) {
        SIGNAL_EVENTS_DELIVERED.inc();
    }

    fn event_dropped(&self) {
        SIGNAL_EVENTS_DROPPED.inc();
    }

    fn feed_lagged(&self, skipped: u64) {
        SIGNAL_FEED_LAGGED.inc_by(skipped);
    }

    fn match_error(&self, operation: &'static str) {
        BUS_MATCH_ERRORS.with_label_values(&[operation]).inc();
    }
}

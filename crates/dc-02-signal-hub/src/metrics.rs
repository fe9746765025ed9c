//! Metrics hooks for subscription lifecycle and delivery.
//!
//! The hub reports through [`SignalMetrics`]; the runtime plugs in a
//! Prometheus-backed recorder. Tests and embedders without metrics use
//! [`NoOpMetrics`].

/// Instrumentation points. Every method defaults to doing nothing.
pub trait SignalMetrics: Send + Sync {
    /// A subscription became Active.
    fn subscription_opened(&self) {}

    /// A subscription moved to Closed. Called once per subscription.
    fn subscription_closed(&self) {}

    /// A matching event entered a delivery queue.
    fn event_delivered(&self) {}

    /// A matching event was discarded because the queue was full.
    fn event_dropped(&self) {}

    /// A dispatcher fell behind the shared feed by `skipped` events.
    fn feed_lagged(&self, _skipped: u64) {}

    /// `add_match` or `remove_match` failed.
    fn match_error(&self, _operation: &'static str) {}
}

/// Recorder that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetrics;

impl SignalMetrics for NoOpMetrics {}

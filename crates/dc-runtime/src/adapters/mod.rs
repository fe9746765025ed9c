//! Port implementations connecting the subsystems to process-wide services.

pub mod metrics;

pub use metrics::PrometheusSignalMetrics;

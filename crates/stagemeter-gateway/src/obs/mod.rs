//! Lightweight in-process metrics.
//!
//! Metrics are stored as atomics and rendered by the `/metrics` handler in
//! Prometheus text format.

pub mod metrics;
pub mod registry;

pub use metrics::{CounterVec, Gauge, HistogramVec, Registry};
pub use registry::{AccuracyReporter, MetricsRegistry, LATENCY_BUCKETS};

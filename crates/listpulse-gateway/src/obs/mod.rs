//! Lightweight in-process ops counters (dependency-free).
//!
//! Stored as atomics and rendered in Prometheus text format by `/ops/metrics`.

pub mod metrics;

pub use metrics::PulseMetrics;

//! Application services invoked by the HTTP routes and the live channel.

pub mod metrics;

pub use metrics::MetricsService;

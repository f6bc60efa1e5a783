//! HTTP request/response handlers (thin wrappers over `MetricsService`).

pub mod error;
pub mod listings;
pub mod metrics;
pub mod ops;

pub use error::ApiError;

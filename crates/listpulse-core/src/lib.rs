//! listpulse core: transport-agnostic contracts for the listing metrics channel.
//!
//! This crate defines the metrics record, the wire messages exchanged over the
//! live channel, and the error surface shared by the gateway and its clients.
//! It carries no transport, runtime, or database dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed client
//! input must surface as `PulseError::MalformedMessage`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metrics;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, PulseError, Result};
pub use metrics::{ListingId, ListingMetrics, MetricField};

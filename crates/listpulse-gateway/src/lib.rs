//! listpulse gateway library entry.
//!
//! This crate wires the metrics store, the subscription registry and
//! broadcaster, the WebSocket transport and the HTTP routes into one server.
//! It also carries the polling client used as the live channel's fallback.
//! It is consumed by the binaries and by integration tests.

pub mod app_state;
pub mod client;
pub mod config;
pub mod http;
pub mod obs;
pub mod realtime;
pub mod router;
pub mod services;
pub mod store;
pub mod transport;

//! Live channel wire format (JSON text frames).
//!
//! Both directions are tagged by a `type` field:
//! - client -> server: `subscribe` / `unsubscribe` naming a listing.
//! - server -> client: `ping`, `metrics_update` with a full snapshot, acks and errors.
//!
//! Decoding never panics; anything that does not match a known variant is a
//! `PulseError::MalformedMessage` and the connection stays open.

pub mod client;
pub mod server;

pub use client::{decode_client, ClientMsg};
pub use server::ServerMsg;

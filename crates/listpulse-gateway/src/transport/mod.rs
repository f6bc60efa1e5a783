//! Transport layer (WebSocket).
//!
//! `session` holds the per-connection state machine with no I/O; `codec`
//! turns socket frames into its events; `ws` runs the socket and executes the
//! effects the state machine asks for.

pub mod codec;
pub mod session;
pub mod ws;

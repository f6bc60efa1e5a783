//! Top-level facade crate for listpulse.
//!
//! Re-exports the wire contracts and the gateway so users can depend on a single crate.

pub mod core {
    pub use listpulse_core::*;
}

pub mod gateway {
    pub use listpulse_gateway::*;
}

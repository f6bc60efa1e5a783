//! Realtime runtime: who is subscribed to which listing, and how snapshots reach them.

pub mod core;
pub mod types;

pub use core::{Broadcaster, SubscriptionRegistry};
pub use types::{ConnId, DeliveryReport, QoS, Subscriber};

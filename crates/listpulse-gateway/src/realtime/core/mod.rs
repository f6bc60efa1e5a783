//! Subscription registry and broadcast dispatcher.

mod broadcast;
mod subscriptions;

pub use broadcast::Broadcaster;
pub use subscriptions::SubscriptionRegistry;

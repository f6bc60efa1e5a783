//! Client side of the metrics channel: the polling fallback.
//!
//! A `MetricsView` holds the latest snapshot per listing. It is fed by the
//! `Poller` on a fixed interval and, when a live connection exists, by
//! `metrics_update` messages; both paths reconcile the same way, so the view
//! converges even if the live channel never connects.

pub mod poller;
pub mod source;
pub mod view;

pub use poller::Poller;
pub use source::{HttpSnapshotSource, SnapshotSource};
pub use view::MetricsView;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use listpulse_core::ListingId;

use super::{MetricsView, SnapshotSource};

/// Periodic re-fetch of the listings a client is showing.
///
/// Runs regardless of whether a live connection exists; a failed poll is
/// logged and simply retried on the next tick.
pub struct Poller {
    source: Arc<dyn SnapshotSource>,
    view: Arc<MetricsView>,
    listings: Vec<ListingId>,
    interval: Duration,
}

impl Poller {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        view: Arc<MetricsView>,
        listings: Vec<ListingId>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            view,
            listings,
            interval,
        }
    }

    /// Fetch every listing once. Returns how many view entries changed.
    pub async fn poll_once(&self) -> usize {
        let mut changed = 0;
        for &listing_id in &self.listings {
            match self.source.fetch(listing_id).await {
                Ok(snapshot) => {
                    if self.view.reconcile(snapshot) {
                        changed += 1;
                    }
                }
                Err(e) => warn!(listing_id, error = %e, "metrics poll failed"),
            }
        }
        changed
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(listings = self.listings.len(), interval_ms = self.interval.as_millis() as u64, "poller started");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let changed = self.poll_once().await;
                    debug!(changed, "poll cycle complete");
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("poller stopped");
    }
}

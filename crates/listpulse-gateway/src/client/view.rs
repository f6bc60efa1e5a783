use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use listpulse_core::protocol::ServerMsg;
use listpulse_core::{ListingId, ListingMetrics};

/// Latest known snapshot per listing.
#[derive(Default)]
pub struct MetricsView {
    entries: DashMap<ListingId, ListingMetrics>,
}

impl MetricsView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins by `last_updated`. Returns whether the view changed.
    pub fn reconcile(&self, snapshot: ListingMetrics) -> bool {
        match self.entries.entry(snapshot.listing_id) {
            Entry::Occupied(mut cur) => {
                if cur.get() == &snapshot || !cur.get().superseded_by(&snapshot) {
                    return false;
                }
                cur.insert(snapshot);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(snapshot);
                true
            }
        }
    }

    /// Fold a live-channel message into the view. Only `metrics_update` carries state.
    pub fn apply(&self, msg: &ServerMsg) -> bool {
        match msg {
            ServerMsg::MetricsUpdate { metrics, .. } => self.reconcile(metrics.clone()),
            _ => false,
        }
    }

    pub fn get(&self, listing_id: ListingId) -> Option<ListingMetrics> {
        self.entries.get(&listing_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};

use listpulse_core::error::{PulseError, Result};
use listpulse_core::ListingId;

use crate::realtime::types::{ConnId, Subscriber};

/// Subscription registry:
/// - `listing_id -> {conn_id -> Subscriber}`
/// - `conn_id -> {listing_id...}` (reverse index for disconnect cleanup)
///
/// Process-local; rebuilt from nothing on restart.
pub struct SubscriptionRegistry {
    by_listing: DashMap<ListingId, DashMap<ConnId, Subscriber>>,
    by_conn: DashMap<ConnId, DashSet<ListingId>>,
    seq: AtomicU64,
    max_per_listing: usize,
}

impl SubscriptionRegistry {
    pub fn new(max_per_listing: usize) -> Self {
        Self {
            by_listing: DashMap::new(),
            by_conn: DashMap::new(),
            seq: AtomicU64::new(1),
            max_per_listing: max_per_listing.max(1),
        }
    }

    pub fn next_conn_id(&self) -> ConnId {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Register interest. Re-subscribing the same connection is a no-op that returns `false`.
    pub fn subscribe(&self, listing_id: ListingId, sub: Subscriber) -> Result<bool> {
        let conn_id = sub.conn_id;
        {
            let set = self.by_listing.entry(listing_id).or_default();
            if set.contains_key(&conn_id) {
                return Ok(false);
            }
            if set.len() >= self.max_per_listing {
                return Err(PulseError::BadRequest(format!(
                    "listing {listing_id} has reached {} subscribers",
                    self.max_per_listing
                )));
            }
            set.insert(conn_id, sub);
        }

        self.by_conn.entry(conn_id).or_default().insert(listing_id);
        Ok(true)
    }

    /// Drop one interest. Returns whether it existed.
    pub fn unsubscribe(&self, conn_id: ConnId, listing_id: ListingId) -> bool {
        let removed = self.detach(listing_id, conn_id);
        if let Some(set) = self.by_conn.get(&conn_id) {
            set.remove(&listing_id);
        }
        self.by_conn.remove_if(&conn_id, |_, set| set.is_empty());
        removed
    }

    /// Remove `conn_id` from every listing it belongs to. Idempotent.
    pub fn unsubscribe_all(&self, conn_id: ConnId) -> usize {
        let Some((_, listings)) = self.by_conn.remove(&conn_id) else {
            return 0;
        };
        listings
            .iter()
            .filter(|l| self.detach(*l.key(), conn_id))
            .count()
    }

    pub fn subscribers(&self, listing_id: ListingId) -> Vec<Subscriber> {
        self.by_listing
            .get(&listing_id)
            .map(|set| set.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, listing_id: ListingId) -> usize {
        self.by_listing.get(&listing_id).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_subscribed(&self, conn_id: ConnId, listing_id: ListingId) -> bool {
        self.by_listing
            .get(&listing_id)
            .map(|s| s.contains_key(&conn_id))
            .unwrap_or(false)
    }

    pub fn listings_of(&self, conn_id: ConnId) -> Vec<ListingId> {
        let mut out: Vec<ListingId> = self
            .by_conn
            .get(&conn_id)
            .map(|s| s.iter().map(|l| *l.key()).collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    /// Number of listings with at least one subscriber.
    pub fn listing_count(&self) -> usize {
        self.by_listing.len()
    }

    fn detach(&self, listing_id: ListingId, conn_id: ConnId) -> bool {
        let removed = self
            .by_listing
            .get(&listing_id)
            .map(|set| set.remove(&conn_id).is_some())
            .unwrap_or(false);
        // checked under the shard lock so a concurrent subscribe is never lost
        self.by_listing.remove_if(&listing_id, |_, set| set.is_empty());
        removed
    }
}

//! Metrics service: counter mutations, snapshots and subscriptions.
//!
//! Every operation that emits a snapshot for a listing runs under that
//! listing's gate, so the order subscribers observe snapshots in is the order
//! the mutations committed. Different listings never wait on each other.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use listpulse_core::error::{PulseError, Result};
use listpulse_core::metrics::check_listing_id;
use listpulse_core::{ListingId, ListingMetrics, MetricField};

use crate::obs::PulseMetrics;
use crate::realtime::{Broadcaster, ConnId, DeliveryReport, Subscriber, SubscriptionRegistry};
use crate::store::{Listing, MetricsStore, NewListing};

pub struct MetricsService {
    store: Arc<dyn MetricsStore>,
    broadcaster: Arc<Broadcaster>,
    registry: Arc<SubscriptionRegistry>,
    gates: DashMap<ListingId, Arc<Mutex<()>>>,
    obs: Arc<PulseMetrics>,
}

impl MetricsService {
    pub fn new(
        store: Arc<dyn MetricsStore>,
        broadcaster: Arc<Broadcaster>,
        registry: Arc<SubscriptionRegistry>,
        obs: Arc<PulseMetrics>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            registry,
            gates: DashMap::new(),
            obs,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Current snapshot; creates a zeroed record if absent.
    pub async fn snapshot(&self, listing_id: ListingId) -> Result<ListingMetrics> {
        self.store
            .get_or_create(listing_id)
            .await
            .map_err(|e| self.note_store_error(e))
    }

    /// Bump one counter, push the new snapshot to subscribers, and return it.
    ///
    /// A store failure is returned to the caller and nothing is broadcast.
    /// Delivery failures never reach the caller. The work runs on its own task,
    /// so a caller that goes away cannot separate a commit from its broadcast.
    pub async fn record(self: &Arc<Self>, listing_id: ListingId, field: MetricField) -> Result<ListingMetrics> {
        let listing_id = check_listing_id(listing_id)?;
        let this = Arc::clone(self);
        tokio::spawn(async move { this.record_gated(listing_id, field).await })
            .await
            .map_err(|e| PulseError::Internal(format!("record task failed: {e}")))?
    }

    async fn record_gated(&self, listing_id: ListingId, field: MetricField) -> Result<ListingMetrics> {
        self.gated(listing_id, async {
            let metrics = self
                .store
                .increment(listing_id, field)
                .await
                .map_err(|e| self.note_store_error(e))?;
            self.obs.mutations.inc(&[("field", field.column())]);
            debug!(listing_id, %field, total = metrics.total(), "counter incremented");

            // the row returned by the increment is the committed state under the gate
            if let Err(e) = self.broadcaster.publish(&metrics).await {
                error!(listing_id, error = %e, "metrics broadcast failed");
            }
            Ok::<_, PulseError>(metrics)
        })
        .await
    }

    /// Fetch the current snapshot and push it to every subscriber. No-op without subscribers.
    pub async fn broadcast(&self, listing_id: ListingId) -> Result<DeliveryReport> {
        if !self.broadcaster.has_subscribers(listing_id) {
            return Ok(DeliveryReport::default());
        }
        self.gated(listing_id, async {
            let metrics = self.snapshot(listing_id).await?;
            self.broadcaster.publish(&metrics).await
        })
        .await
    }

    /// Register `sub` for `listing_id` and send it the current snapshot straight away.
    ///
    /// Unknown listings are rejected before anything is registered.
    pub async fn subscribe(&self, listing_id: ListingId, sub: Subscriber) -> Result<ListingMetrics> {
        let listing_id = check_listing_id(listing_id)?;
        let conn_id = sub.conn_id;
        let metrics = self
            .gated(listing_id, async {
                let metrics = self.snapshot(listing_id).await?;
                self.registry.subscribe(listing_id, sub.clone())?;
                self.broadcaster.publish_to(&sub, &metrics)?;
                Ok::<_, PulseError>(metrics)
            })
            .await?;
        info!(listing_id, conn_id, "client subscribed");
        Ok(metrics)
    }

    pub fn unsubscribe(&self, conn_id: ConnId, listing_id: ListingId) -> bool {
        self.registry.unsubscribe(conn_id, listing_id)
    }

    /// Purge a closed connection from every listing.
    pub fn disconnect(&self, conn_id: ConnId) -> usize {
        let n = self.registry.unsubscribe_all(conn_id);
        debug!(conn_id, listings = n, "connection purged from registry");
        n
    }

    pub async fn create_listing(&self, new: NewListing) -> Result<Listing> {
        self.store
            .create_listing(new)
            .await
            .map_err(|e| self.note_store_error(e))
    }

    pub async fn list_listings(&self) -> Result<Vec<Listing>> {
        self.store
            .list_listings()
            .await
            .map_err(|e| self.note_store_error(e))
    }

    async fn gated<T>(&self, listing_id: ListingId, work: impl Future<Output = T>) -> T {
        let _gate = self.gate(listing_id).await;
        work.await
    }

    async fn gate(&self, listing_id: ListingId) -> Gate<'_> {
        let lock = self
            .gates
            .entry(listing_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Gate {
            gates: &self.gates,
            listing_id,
            held: Some(lock.lock_owned().await),
        }
    }

    fn note_store_error(&self, e: PulseError) -> PulseError {
        if let PulseError::StoreFailure(msg) = &e {
            error!(error = %msg, "metrics store failure");
            self.obs.store_errors.inc(&[]);
        }
        e
    }
}

/// Held for the duration of one gated operation; the map entry goes away with the last holder.
struct Gate<'a> {
    gates: &'a DashMap<ListingId, Arc<Mutex<()>>>,
    listing_id: ListingId,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for Gate<'_> {
    // Only the map holds the lock once every guard is gone; the count is read under the shard lock.
    fn drop(&mut self) {
        drop(self.held.take());
        self.gates
            .remove_if(&self.listing_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    use listpulse_core::protocol::ServerMsg;

    use crate::config::DatabaseSection;
    use crate::realtime::QoS;
    use crate::store::SqliteStore;

    /// Commits the increment, then lingers before answering.
    struct SlowStore {
        inner: SqliteStore,
        linger: Duration,
    }

    #[async_trait]
    impl MetricsStore for SlowStore {
        async fn listing_exists(&self, id: ListingId) -> Result<bool> {
            self.inner.listing_exists(id).await
        }

        async fn get_or_create(&self, id: ListingId) -> Result<ListingMetrics> {
            self.inner.get_or_create(id).await
        }

        async fn increment(&self, id: ListingId, field: MetricField) -> Result<ListingMetrics> {
            let metrics = self.inner.increment(id, field).await?;
            tokio::time::sleep(self.linger).await;
            Ok(metrics)
        }

        async fn create_listing(&self, new: NewListing) -> Result<Listing> {
            self.inner.create_listing(new).await
        }

        async fn list_listings(&self) -> Result<Vec<Listing>> {
            self.inner.list_listings().await
        }
    }

    async fn service(linger: Duration) -> (Arc<MetricsService>, ListingId) {
        let cfg = DatabaseSection {
            url: "sqlite::memory:".into(),
            ..DatabaseSection::default()
        };
        let inner = SqliteStore::connect(&cfg).await.unwrap();
        let id = inner
            .create_listing(NewListing {
                title: "lamp".into(),
                description: String::new(),
                price: 12.0,
                image_url: String::new(),
            })
            .await
            .unwrap()
            .id;

        let obs = Arc::new(PulseMetrics::default());
        let registry = Arc::new(SubscriptionRegistry::new(64));
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry), QoS::Lossy, Arc::clone(&obs)));
        let store = Arc::new(SlowStore { inner, linger });
        (Arc::new(MetricsService::new(store, broadcaster, registry, obs)), id)
    }

    fn views(rx: &mut mpsc::Receiver<Message>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Ok(Message::Text(t)) = rx.try_recv() {
            match serde_json::from_str(&t).unwrap() {
                ServerMsg::MetricsUpdate { metrics, .. } => out.push(metrics.views),
                other => panic!("unexpected message: {other:?}"),
            }
        }
        out
    }

    #[tokio::test]
    async fn abandoned_record_still_broadcasts_its_commit() {
        let (svc, id) = service(Duration::from_millis(100)).await;
        let (tx, mut rx) = mpsc::channel(16);
        svc.subscribe(id, Subscriber::new(svc.registry().next_conn_id(), tx))
            .await
            .unwrap();
        assert_eq!(views(&mut rx), vec![0]);

        let first = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.record(id, MetricField::Views).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        first.abort();

        let second = svc.record(id, MetricField::Views).await.unwrap();
        assert_eq!(second.views, 2);
        assert_eq!(views(&mut rx), vec![1, 2]);
        assert!(svc.gates.is_empty());
    }

    #[tokio::test]
    async fn gates_are_dropped_once_idle() {
        let (svc, id) = service(Duration::ZERO).await;
        svc.record(id, MetricField::Clicks).await.unwrap();
        svc.snapshot(id).await.unwrap();
        assert!(svc.gates.is_empty());

        let err = svc.record(id + 1000, MetricField::Clicks).await.unwrap_err();
        assert!(matches!(err, PulseError::NotFound(_)));
        assert!(svc.gates.is_empty());
    }
}

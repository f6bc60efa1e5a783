use std::sync::Arc;

use axum::extract::ws::Message;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use listpulse_core::error::{PulseError, Result};
use listpulse_core::protocol::ServerMsg;
use listpulse_core::{ListingId, ListingMetrics};

use crate::obs::PulseMetrics;
use crate::realtime::core::SubscriptionRegistry;
use crate::realtime::types::{DeliveryReport, QoS, Subscriber};

/// Broadcaster: pushes full metrics snapshots to a listing's subscribers.
///
/// A failed send affects only that subscriber: it is pruned from the registry
/// and its session is evicted within the same fan-out. Nothing is retried; the
/// next mutation or the client's poll supersedes a dropped update.
pub struct Broadcaster {
    registry: Arc<SubscriptionRegistry>,
    qos: QoS,
    obs: Arc<PulseMetrics>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriptionRegistry>, qos: QoS, obs: Arc<PulseMetrics>) -> Self {
        Self { registry, qos, obs }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn has_subscribers(&self, listing_id: ListingId) -> bool {
        self.registry.subscriber_count(listing_id) > 0
    }

    /// Send `metrics` to every subscriber of its listing.
    pub async fn publish(&self, metrics: &ListingMetrics) -> Result<DeliveryReport> {
        let listing_id = metrics.listing_id;
        let subs = self.registry.subscribers(listing_id);
        if subs.is_empty() {
            return Ok(DeliveryReport::default());
        }

        let text = ServerMsg::update(metrics.clone()).to_json()?;
        self.obs.broadcasts.inc(&[]);

        let mut futs = FuturesUnordered::new();
        for sub in subs {
            let msg = Message::Text(text.clone());
            futs.push(async move {
                let res = self.send(&sub, msg).await;
                (sub, res)
            });
        }

        let mut report = DeliveryReport::default();
        while let Some((sub, res)) = futs.next().await {
            match res {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(listing_id, conn_id = sub.conn_id, error = %e, "metrics delivery failed");
                    self.prune(&sub);
                    report.pruned += 1;
                }
            }
        }

        debug!(listing_id, delivered = report.delivered, pruned = report.pruned, "metrics broadcast");
        Ok(report)
    }

    /// Send `metrics` to one subscriber only (initial snapshot after subscribe).
    ///
    /// Never waits, whatever the QoS: the caller is the session task that drains this queue.
    pub fn publish_to(&self, sub: &Subscriber, metrics: &ListingMetrics) -> Result<()> {
        let text = ServerMsg::update(metrics.clone()).to_json()?;
        let res = self.try_send(sub, Message::Text(text));
        self.count_delivery(&res);
        if let Err(e) = &res {
            warn!(listing_id = metrics.listing_id, conn_id = sub.conn_id, error = %e, "initial snapshot failed");
            self.prune(sub);
        }
        res
    }

    async fn send(&self, sub: &Subscriber, msg: Message) -> Result<()> {
        if !sub.is_open() {
            self.obs.deliveries.inc(&[("outcome", "failed")]);
            return Err(PulseError::DeliveryFailure("connection closed".into()));
        }

        let res = match self.qos {
            QoS::Lossy => self.try_send(sub, msg),
            QoS::Reliable { timeout_ms } => {
                match timeout(Duration::from_millis(timeout_ms), sub.tx.send(msg)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(PulseError::DeliveryFailure("connection closed".into())),
                    Err(_) => Err(PulseError::DeliveryFailure(format!(
                        "send timed out after {timeout_ms}ms"
                    ))),
                }
            }
        };

        self.count_delivery(&res);
        res
    }

    fn try_send(&self, sub: &Subscriber, msg: Message) -> Result<()> {
        if !sub.is_open() {
            return Err(PulseError::DeliveryFailure("connection closed".into()));
        }
        sub.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => PulseError::DeliveryFailure("outbound queue full".into()),
            TrySendError::Closed(_) => PulseError::DeliveryFailure("connection closed".into()),
        })
    }

    fn count_delivery(&self, res: &Result<()>) {
        let outcome = if res.is_ok() { "ok" } else { "failed" };
        self.obs.deliveries.inc(&[("outcome", outcome)]);
    }

    fn prune(&self, sub: &Subscriber) {
        self.registry.unsubscribe_all(sub.conn_id);
        sub.evict();
        self.obs.subscribers_pruned.inc(&[]);
    }
}

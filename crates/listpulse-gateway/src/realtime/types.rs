use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, Notify};

/// Process-unique connection id.
pub type ConnId = u64;

/// Delivery strategy for metrics snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    /// Never await: a full queue counts as a failed send.
    #[default]
    Lossy,
    /// Await each send, but no longer than `timeout_ms`.
    Reliable { timeout_ms: u64 },
}

/// A live connection's handle as seen by the registry.
///
/// Cloning is cheap; every clone feeds the same outbound queue.
#[derive(Clone, Debug)]
pub struct Subscriber {
    pub conn_id: ConnId,
    pub tx: mpsc::Sender<Message>,
    evict: Arc<Notify>,
}

impl Subscriber {
    pub fn new(conn_id: ConnId, tx: mpsc::Sender<Message>) -> Self {
        Self {
            conn_id,
            tx,
            evict: Arc::new(Notify::new()),
        }
    }

    /// A receiver half that is gone means the session loop has exited.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Ask the owning session to shut down. A permit is stored if it is not waiting yet.
    pub fn evict(&self) {
        self.evict.notify_one();
    }

    /// Resolves once the broadcaster has given up on this connection.
    pub async fn evicted(&self) {
        self.evict.notified().await;
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub pruned: usize,
}

//! Shared fixtures: an in-memory gateway with a couple of listings.

#![allow(dead_code)]

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use listpulse_core::protocol::ServerMsg;
use listpulse_core::ListingId;
use listpulse_gateway::app_state::AppState;
use listpulse_gateway::config;
use listpulse_gateway::realtime::Subscriber;
use listpulse_gateway::store::{MetricsStore, NewListing, SqliteStore};

pub const MEMORY_CONFIG: &str = r#"
version: 1
database:
  url: "sqlite::memory:"
"#;

pub async fn app() -> (AppState, Arc<SqliteStore>) {
    let cfg = config::load_from_str(MEMORY_CONFIG).unwrap();
    let store = Arc::new(SqliteStore::connect(&cfg.database).await.unwrap());
    let state = AppState::new(cfg, Arc::clone(&store) as Arc<dyn MetricsStore>).unwrap();
    (state, store)
}

pub async fn listing(store: &SqliteStore, title: &str) -> ListingId {
    store
        .create_listing(NewListing {
            title: title.into(),
            description: format!("{title} for sale"),
            price: 25.0,
            image_url: format!("/uploads/{title}.jpg"),
        })
        .await
        .unwrap()
        .id
}

pub fn subscriber(app: &AppState, depth: usize) -> (Subscriber, mpsc::Receiver<Message>) {
    let (tx, rx) = mpsc::channel(depth);
    (Subscriber::new(app.service().registry().next_conn_id(), tx), rx)
}

/// Drain everything queued for a subscriber, decoded.
pub fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(m) = rx.try_recv() {
        if let Message::Text(t) = m {
            out.push(serde_json::from_str(&t).unwrap());
        }
    }
    out
}

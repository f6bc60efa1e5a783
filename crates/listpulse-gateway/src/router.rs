//! Axum router wiring.
//!
//! The REST routes are mounted both at the root and under `/api`; `/ws`
//! upgrades to the live metrics channel.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{app_state::AppState, http, transport};

fn api() -> Router<AppState> {
    Router::new()
        .route("/listings", get(http::listings::list).post(http::listings::create))
        .route("/listings/:id/metrics", get(http::metrics::get_metrics))
        .route("/listings/:id/view", post(http::metrics::track_view))
        .route("/listings/:id/share", post(http::metrics::track_share))
        .route("/listings/:id/click", post(http::metrics::track_click))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api())
        .nest("/api", api())
        .route("/ws", get(transport::ws::ws_upgrade))
        .route("/healthz", get(http::ops::healthz))
        .route("/ops/metrics", get(http::ops::render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

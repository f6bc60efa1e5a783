//! listpulse gateway
//!
//! - REST: listing metrics read + view/share/click counters
//! - WebSocket endpoint: /ws (subscribe to a listing, receive metrics_update pushes)
//! - Ops: /healthz, /ops/metrics

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use listpulse_core::error::{PulseError, Result};
use listpulse_gateway::store::SqliteStore;
use listpulse_gateway::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = config::config_path();
    let cfg = if std::path::Path::new(&path).exists() {
        config::load_from_file(&path)?
    } else {
        tracing::warn!(%path, "config file not found, using defaults");
        config::load_from_str("version: 1")?
    };
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| PulseError::BadRequest(format!("server.listen must be a valid SocketAddr: {e}")))?;

    let store = SqliteStore::connect(&cfg.database).await?;
    let state = app_state::AppState::new(cfg, Arc::new(store))?;
    let app = router::build_router(state);

    tracing::info!(%listen, "listpulse-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| PulseError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PulseError::Internal(format!("server failed: {e}")))?;

    tracing::info!("listpulse-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

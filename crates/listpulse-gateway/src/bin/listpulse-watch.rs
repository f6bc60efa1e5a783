//! listpulse-watch: poll listing metrics from a running gateway and log changes.
//!
//! This is the polling fallback on its own; it works whether or not any live
//! connection exists.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use listpulse_core::error::Result;
use listpulse_core::ListingId;
use listpulse_gateway::client::{HttpSnapshotSource, MetricsView, Poller};
use listpulse_gateway::config::{self, PollerSection};

#[derive(Debug, Parser)]
#[command(name = "listpulse-watch", about = "Poll listing metrics from a listpulse gateway")]
struct Args {
    /// Gateway base url (REST root).
    #[arg(long, env = "LISTPULSE_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Poll interval in milliseconds (default: `poller.interval_ms` from the config file).
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Listings to watch.
    #[arg(required = true)]
    listings: Vec<ListingId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let interval = match args.interval_ms {
        Some(ms) => Duration::from_millis(ms.max(100)),
        None => poller_config()?.interval(),
    };

    let source = Arc::new(HttpSnapshotSource::new(args.url.clone())?);
    let view = Arc::new(MetricsView::new());
    let poller = Poller::new(
        source,
        Arc::clone(&view),
        args.listings.clone(),
        interval,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(poller.run(stop_rx));

    let mut report = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = report.tick() => {
                for &id in &args.listings {
                    if let Some(m) = view.get(id) {
                        tracing::info!(
                            listing_id = id,
                            views = m.views,
                            shares = m.shares,
                            clicks = m.clicks,
                            last_updated = %m.last_updated,
                            "metrics"
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = stop_tx.send(true);
    let _ = task.await;
    Ok(())
}

fn poller_config() -> Result<PollerSection> {
    let path = config::config_path();
    if std::path::Path::new(&path).exists() {
        Ok(config::load_from_file(&path)?.poller)
    } else {
        Ok(PollerSection::default())
    }
}

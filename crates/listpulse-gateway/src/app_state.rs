//! Shared application state.
//!
//! Constructed once at startup and handed to every route by axum. Owns the
//! subscription registry (through the metrics service); nothing here is a
//! module-level singleton.

use std::sync::Arc;

use listpulse_core::error::Result;

use crate::config::PulseConfig;
use crate::obs::PulseMetrics;
use crate::realtime::{Broadcaster, SubscriptionRegistry};
use crate::services::MetricsService;
use crate::store::MetricsStore;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: PulseConfig,
    service: Arc<MetricsService>,
    obs: Arc<PulseMetrics>,
}

impl AppState {
    /// Build application state around an already-connected store.
    pub fn new(cfg: PulseConfig, store: Arc<dyn MetricsStore>) -> Result<Self> {
        cfg.validate()?;

        let obs = Arc::new(PulseMetrics::default());
        let registry = Arc::new(SubscriptionRegistry::new(
            cfg.broadcast.max_subscribers_per_listing,
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&registry),
            cfg.broadcast.qos(),
            Arc::clone(&obs),
        ));
        let service = Arc::new(MetricsService::new(
            store,
            broadcaster,
            registry,
            Arc::clone(&obs),
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, service, obs }),
        })
    }

    pub fn cfg(&self) -> &PulseConfig {
        &self.inner.cfg
    }

    pub fn service(&self) -> Arc<MetricsService> {
        Arc::clone(&self.inner.service)
    }

    pub fn obs(&self) -> &PulseMetrics {
        &self.inner.obs
    }
}

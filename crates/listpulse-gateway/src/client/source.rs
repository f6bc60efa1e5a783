use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use listpulse_core::error::{PulseError, Result};
use listpulse_core::{ListingId, ListingMetrics};

/// Anything that can produce the current snapshot of a listing on request.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, listing_id: ListingId) -> Result<ListingMetrics>;
}

/// Reads `GET {base}/listings/{id}/metrics`.
pub struct HttpSnapshotSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PulseError::Internal(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn metrics_url(&self, listing_id: ListingId) -> String {
        format!("{}/listings/{}/metrics", self.base_url, listing_id)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self, listing_id: ListingId) -> Result<ListingMetrics> {
        let url = self.metrics_url(listing_id);
        tracing::debug!(listing_id, url = %url, "polling metrics");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PulseError::Internal(format!("metrics request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PulseError::listing_not_found(listing_id));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PulseError::Internal(format!("metrics request returned {status}: {text}")));
        }

        response
            .json::<ListingMetrics>()
            .await
            .map_err(|e| PulseError::MalformedMessage(format!("metrics body: {e}")))
    }
}

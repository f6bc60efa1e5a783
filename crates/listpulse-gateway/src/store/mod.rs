//! Metrics persistence.
//!
//! The store owns the durable counters and the listing-existence check the
//! metrics operations depend on. Counter increments are atomic at the storage
//! layer; the application never does read-modify-write on a counter.

mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use listpulse_core::error::{PulseError, Result};
use listpulse_core::{ListingId, ListingMetrics, MetricField};

pub use sqlite::SqliteStore;

/// A for-sale item, as far as the metrics channel cares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image_url: String,
}

impl NewListing {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(PulseError::BadRequest("title must not be empty".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(PulseError::BadRequest("price must be a non-negative number".into()));
        }
        Ok(())
    }
}

#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn listing_exists(&self, id: ListingId) -> Result<bool>;

    /// Return the metrics record, inserting a zeroed one if absent.
    async fn get_or_create(&self, id: ListingId) -> Result<ListingMetrics>;

    /// Atomically add 1 to `field` and refresh `last_updated`, creating the record first if absent.
    async fn increment(&self, id: ListingId, field: MetricField) -> Result<ListingMetrics>;

    /// Insert a listing together with its zeroed metrics record.
    async fn create_listing(&self, new: NewListing) -> Result<Listing>;

    async fn list_listings(&self) -> Result<Vec<Listing>>;
}

pub(crate) fn store_err(e: sqlx::Error) -> PulseError {
    PulseError::StoreFailure(e.to_string())
}

//! Server -> client messages.

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};
use crate::metrics::{ListingId, ListingMetrics};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Liveness hint sent once on connect.
    Ping,
    MetricsUpdate {
        #[serde(rename = "listingId")]
        listing_id: ListingId,
        metrics: ListingMetrics,
    },
    Unsubscribed {
        #[serde(rename = "listingId")]
        listing_id: ListingId,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMsg {
    pub fn update(metrics: ListingMetrics) -> Self {
        ServerMsg::MetricsUpdate {
            listing_id: metrics.listing_id,
            metrics,
        }
    }

    pub fn error(err: &PulseError) -> Self {
        ServerMsg::Error {
            code: err.client_code().as_str().to_string(),
            msg: err.to_string(),
        }
    }

    /// Serialize once; the text is shared by every recipient of a broadcast.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PulseError::Internal(format!("json encode failed: {e}")))
    }
}

//! Listing metrics record and counter selector.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

/// Listing identifier (database row id).
pub type ListingId = i64;

/// Reject identifiers that can never name a listing.
pub fn check_listing_id(id: ListingId) -> Result<ListingId> {
    if id <= 0 {
        return Err(PulseError::listing_not_found(id));
    }
    Ok(id)
}

/// Durable counters for one listing. Always pushed as a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingMetrics {
    pub listing_id: ListingId,
    pub views: u64,
    pub shares: u64,
    pub clicks: u64,
    pub last_updated: DateTime<Utc>,
}

impl ListingMetrics {
    /// A zeroed record, as created lazily on first touch.
    pub fn zeroed(listing_id: ListingId, now: DateTime<Utc>) -> Self {
        Self {
            listing_id,
            views: 0,
            shares: 0,
            clicks: 0,
            last_updated: now,
        }
    }

    /// Sum of all counters. Counters never decrease, so a larger total is a newer snapshot.
    pub fn total(&self) -> u64 {
        self.views + self.shares + self.clicks
    }

    /// Whether `other` should replace `self` in a client-side view.
    ///
    /// Last write wins by `last_updated`; equal timestamps replace.
    pub fn superseded_by(&self, other: &ListingMetrics) -> bool {
        other.listing_id == self.listing_id && other.last_updated >= self.last_updated
    }
}

/// The three counters a request may bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricField {
    Views,
    Shares,
    Clicks,
}

impl MetricField {
    pub const ALL: [MetricField; 3] = [MetricField::Views, MetricField::Shares, MetricField::Clicks];

    /// Column name in the metrics table.
    pub fn column(self) -> &'static str {
        match self {
            MetricField::Views => "views",
            MetricField::Shares => "shares",
            MetricField::Clicks => "clicks",
        }
    }

    /// Route segment that bumps this counter (`/listings/{id}/<action>`).
    pub fn action(self) -> &'static str {
        match self {
            MetricField::Views => "view",
            MetricField::Shares => "share",
            MetricField::Clicks => "click",
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for MetricField {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "view" | "views" => Ok(MetricField::Views),
            "share" | "shares" => Ok(MetricField::Shares),
            "click" | "clicks" => Ok(MetricField::Clicks),
            other => Err(PulseError::BadRequest(format!("unknown metric: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    #[test]
    fn serializes_camel_case() {
        let m = ListingMetrics::zeroed(3, at(0));
        let v = serde_json::to_value(&m).unwrap_or_default();
        assert_eq!(v["listingId"], 3);
        assert_eq!(v["views"], 0);
        assert!(v["lastUpdated"].as_str().is_some());
    }

    #[test]
    fn non_positive_ids_are_not_found() {
        assert!(check_listing_id(0).is_err());
        assert!(check_listing_id(-4).is_err());
        assert_eq!(check_listing_id(9).ok(), Some(9));
    }

    #[test]
    fn last_write_wins() {
        let old = ListingMetrics::zeroed(1, at(10));
        let mut newer = old.clone();
        newer.views = 2;
        newer.last_updated = at(11);
        assert!(old.superseded_by(&newer));
        assert!(!newer.superseded_by(&old));

        let mut other = newer.clone();
        other.listing_id = 2;
        assert!(!old.superseded_by(&other));
    }

    #[test]
    fn field_names_round_trip_from_actions() {
        for f in MetricField::ALL {
            assert_eq!(f.action().parse::<MetricField>().ok(), Some(f));
            assert_eq!(f.column().parse::<MetricField>().ok(), Some(f));
        }
        assert!("likes".parse::<MetricField>().is_err());
    }
}

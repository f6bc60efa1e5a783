//! Client -> server messages.

use serde::{Deserialize, Deserializer};

use crate::error::{PulseError, Result};
use crate::metrics::ListingId;

/// Messages a connection may send after it is open.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    Subscribe {
        #[serde(rename = "listingId", deserialize_with = "lenient_listing_id")]
        listing_id: ListingId,
    },
    Unsubscribe {
        #[serde(rename = "listingId", deserialize_with = "lenient_listing_id")]
        listing_id: ListingId,
    },
}

impl ClientMsg {
    pub fn listing_id(&self) -> ListingId {
        match self {
            ClientMsg::Subscribe { listing_id } | ClientMsg::Unsubscribe { listing_id } => *listing_id,
        }
    }
}

/// Decode one text frame.
pub fn decode_client(text: &str) -> Result<ClientMsg> {
    serde_json::from_str(text).map_err(|e| PulseError::MalformedMessage(e.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Num(i64),
    Text(String),
}

// Browsers have been seen sending the id as a string ("42").
fn lenient_listing_id<'de, D>(de: D) -> std::result::Result<ListingId, D::Error>
where
    D: Deserializer<'de>,
{
    match IdRepr::deserialize(de)? {
        IdRepr::Num(n) => Ok(n),
        IdRepr::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("listingId is not an integer: {s:?}"))),
    }
}

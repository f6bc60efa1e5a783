//! Shared error type across listpulse crates.

use thiserror::Error;

use crate::metrics::ListingId;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Unknown listing.
    NotFound,
    /// Unparseable or unknown client message.
    MalformedMessage,
    /// A send to one subscriber failed.
    DeliveryFailure,
    /// Persistence layer unavailable or rejected the operation.
    StoreFailure,
    /// Invalid input that is not a protocol message.
    BadRequest,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::MalformedMessage => "MALFORMED_MESSAGE",
            ClientCode::DeliveryFailure => "DELIVERY_FAILURE",
            ClientCode::StoreFailure => "STORE_FAILURE",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("delivery failure: {0}")]
    DeliveryFailure(String),
    #[error("store failure: {0}")]
    StoreFailure(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PulseError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            PulseError::NotFound(_) => ClientCode::NotFound,
            PulseError::MalformedMessage(_) => ClientCode::MalformedMessage,
            PulseError::DeliveryFailure(_) => ClientCode::DeliveryFailure,
            PulseError::StoreFailure(_) => ClientCode::StoreFailure,
            PulseError::BadRequest(_) => ClientCode::BadRequest,
            PulseError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Shorthand for the unknown-listing case.
    pub fn listing_not_found(id: ListingId) -> Self {
        PulseError::NotFound(format!("listing {id} not found"))
    }
}

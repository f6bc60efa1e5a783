use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use listpulse_core::error::PulseError;

/// `PulseError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub PulseError);

impl From<PulseError> for ApiError {
    fn from(e: PulseError) -> Self {
        ApiError(e)
    }
}

// Extractor failures answer with the same JSON body as every other error.
impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError(PulseError::BadRequest(e.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError(PulseError::BadRequest(e.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PulseError::NotFound(_) => StatusCode::NOT_FOUND,
            PulseError::BadRequest(_) | PulseError::MalformedMessage(_) => StatusCode::BAD_REQUEST,
            PulseError::StoreFailure(_)
            | PulseError::DeliveryFailure(_)
            | PulseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "code": self.0.client_code().as_str(),
                "msg": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

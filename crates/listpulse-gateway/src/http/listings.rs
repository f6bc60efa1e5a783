use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::ApiError;
use crate::app_state::AppState;
use crate::store::{Listing, NewListing};

pub async fn list(State(app): State<AppState>) -> Result<Json<Vec<Listing>>, ApiError> {
    Ok(Json(app.service().list_listings().await?))
}

pub async fn create(
    State(app): State<AppState>,
    body: Result<Json<NewListing>, JsonRejection>,
) -> Result<Json<Listing>, ApiError> {
    let Json(new) = body?;
    Ok(Json(app.service().create_listing(new).await?))
}

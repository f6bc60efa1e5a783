use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;

use listpulse_core::{ListingId, ListingMetrics, MetricField};

use super::ApiError;
use crate::app_state::AppState;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;
type ListingPath = std::result::Result<Path<ListingId>, PathRejection>;

/// `GET /listings/:id/metrics`
pub async fn get_metrics(State(app): State<AppState>, path: ListingPath) -> ApiResult<ListingMetrics> {
    let Path(id) = path?;
    Ok(Json(app.service().snapshot(id).await?))
}

async fn track(app: AppState, path: ListingPath, field: MetricField) -> ApiResult<ListingMetrics> {
    let Path(id) = path?;
    Ok(Json(app.service().record(id, field).await?))
}

/// `POST /listings/:id/view`
pub async fn track_view(State(app): State<AppState>, path: ListingPath) -> ApiResult<ListingMetrics> {
    track(app, path, MetricField::Views).await
}

/// `POST /listings/:id/share`
pub async fn track_share(State(app): State<AppState>, path: ListingPath) -> ApiResult<ListingMetrics> {
    track(app, path, MetricField::Shares).await
}

/// `POST /listings/:id/click`
pub async fn track_click(State(app): State<AppState>, path: ListingPath) -> ApiResult<ListingMetrics> {
    track(app, path, MetricField::Clicks).await
}

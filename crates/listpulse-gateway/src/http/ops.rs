use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::app_state::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn render_metrics(State(app): State<AppState>) -> impl IntoResponse {
    let mut body = app.obs().render();
    let service = app.service();
    body.push_str(&format!(
        "# TYPE listpulse_subscribed_listings gauge\nlistpulse_subscribed_listings {}\n",
        service.registry().listing_count()
    ));
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

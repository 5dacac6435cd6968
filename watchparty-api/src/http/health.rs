//! Liveness and runtime counters.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use watchparty_core::dispatch::Stats;

use crate::http::{AppResult, AppState};

pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/stats", get(stats))
}

/// Always OK while the process serves requests.
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    Ok(Json(state.sync.stats().await?))
}

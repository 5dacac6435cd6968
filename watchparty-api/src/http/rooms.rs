//! Public room browser.

use axum::{extract::State, routing::get, Json, Router};
use watchparty_core::models::RoomSummary;

use crate::http::{AppResult, AppState};

pub fn create_rooms_router() -> Router<AppState> {
    Router::new().route("/api/watch-rooms", get(list_public_rooms))
}

/// Public rooms, newest first. Private rooms never appear here.
pub async fn list_public_rooms(State(state): State<AppState>) -> AppResult<Json<Vec<RoomSummary>>> {
    let rooms = state.sync.list_public().await?;
    tracing::debug!(count = rooms.len(), "Listing public rooms");
    Ok(Json(rooms))
}

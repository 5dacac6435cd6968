//! HTTP routes: health, public room listing and the WebSocket endpoint.

pub mod error;
pub mod health;
pub mod rooms;
pub mod websocket;

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use watchparty_core::config::ServerConfig;
use watchparty_core::SyncHandle;

pub use error::{AppError, AppResult};

/// WebSocket liveness settings.
#[derive(Debug, Clone, Copy)]
pub struct WsSettings {
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
}

impl From<&ServerConfig> for WsSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ws_ping_interval_secs),
            idle_timeout: Duration::from_secs(config.ws_idle_timeout_secs),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sync: SyncHandle,
    pub ws: WsSettings,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::create_health_router())
        .merge(rooms::create_rooms_router())
        .route("/watch-together", get(websocket::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! HTTP and WebSocket transport for the watch-party sync engine.

pub mod http;

pub use http::{create_router, AppError, AppResult, AppState, WsSettings};

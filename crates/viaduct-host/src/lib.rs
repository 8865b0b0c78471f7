//! Viaduct host library logic.
//!
//! Wires the engine registry and the connection bridge behind a small HTTP
//! control API. The control API is the seam for the external UI/state layer:
//! it invokes connect/disconnect and observes status, and never reaches into
//! the engine or the socket directly.

pub mod api_bridge;
pub mod api_engine;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use viaduct_bridge::ConnectionBridge;
use viaduct_engine::InstanceRegistry;

/// Application state shared across all request handlers.
pub struct AppState {
    /// The process-wide engine instance registry.
    pub registry: Arc<InstanceRegistry>,
    /// The connection bridge.
    pub bridge: Arc<ConnectionBridge>,
}

/// Maximum request body size (64 KiB). Control requests are tiny; anything
/// larger is a mistake.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the control API router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/bridge/status", get(api_bridge::status_handler))
        .route("/api/bridge/connect", post(api_bridge::connect_handler))
        .route(
            "/api/bridge/disconnect",
            post(api_bridge::disconnect_handler),
        )
        .route("/api/engine/version", get(api_engine::version_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

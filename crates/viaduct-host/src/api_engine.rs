//! Control API handlers for the engine runtime.

use crate::AppState;
use axum::{http::StatusCode, Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use viaduct_engine::EngineError;

/// `GET /api/engine/version` — build version of the underlying engine
/// implementation. `503` when no engine runtime is loaded in this
/// environment.
pub async fn version_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.registry.runtime_version() {
        Ok(version) => Ok(Json(json!({ "version": version }))),
        Err(e @ EngineError::Unavailable) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )),
        Err(e) => {
            tracing::error!("runtime version query failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

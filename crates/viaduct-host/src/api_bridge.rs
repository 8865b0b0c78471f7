//! Control API handlers for the connection bridge.

use crate::AppState;
use axum::{http::StatusCode, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use viaduct_bridge::BridgeError;
use viaduct_engine::EngineError;
use viaduct_types::BridgeStatus;

/// Request body for `POST /api/bridge/connect`.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// Identifier of the database to expose.
    pub database_id: String,
}

/// `GET /api/bridge/status` — current connection status snapshot.
pub async fn status_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<BridgeStatus> {
    Json(state.bridge.status())
}

/// `POST /api/bridge/connect` — connects the named database to its remote
/// peer. Returns the post-connect status snapshot.
pub async fn connect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<BridgeStatus>, (StatusCode, Json<Value>)> {
    match state.bridge.connect(&request.database_id).await {
        Ok(()) => Ok(Json(state.bridge.status())),
        Err(e) => {
            tracing::warn!(
                database_id = %request.database_id,
                "bridge connect failed: {}",
                e
            );
            Err((error_status(&e), Json(json!({ "error": e.to_string() }))))
        }
    }
}

/// `POST /api/bridge/disconnect` — idempotent; returns the resulting status.
pub async fn disconnect_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<BridgeStatus> {
    state.bridge.disconnect().await;
    Json(state.bridge.status())
}

/// Maps a connect failure to an HTTP status for the control API.
fn error_status(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::Engine(EngineError::InvalidIdentifier(_)) => StatusCode::BAD_REQUEST,
        BridgeError::Engine(EngineError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BridgeError::Transport(_) | BridgeError::Endpoint(_) => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viaduct_types::InvalidDatabaseId;

    #[test]
    fn error_status_mapping() {
        let invalid = BridgeError::Engine(EngineError::InvalidIdentifier(InvalidDatabaseId {
            id: "Bad".to_string(),
            reason: "test",
        }));
        assert_eq!(error_status(&invalid), StatusCode::BAD_REQUEST);

        let unavailable = BridgeError::Engine(EngineError::Unavailable);
        assert_eq!(error_status(&unavailable), StatusCode::SERVICE_UNAVAILABLE);

        let instantiation = BridgeError::Engine(EngineError::Instantiation {
            id: "db-a".to_string(),
            reason: "disk full".to_string(),
        });
        assert_eq!(error_status(&instantiation), StatusCode::INTERNAL_SERVER_ERROR);

        let endpoint = BridgeError::Endpoint("bad domain".to_string());
        assert_eq!(error_status(&endpoint), StatusCode::BAD_GATEWAY);
    }
}

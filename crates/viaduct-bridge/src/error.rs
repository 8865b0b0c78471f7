//! Error types for the connection bridge.

use viaduct_engine::EngineError;

/// Errors surfaced by [`ConnectionBridge::connect`](crate::ConnectionBridge::connect).
///
/// Only setup failures reach callers this way; failures after the connection
/// is open drive the status watch to `errored`/`closed` instead, since the
/// original caller has long since returned.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Resolving or constructing the engine instance failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The socket transport failed (handshake or connection-level).
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The proxy endpoint configuration or derived address is unusable.
    #[error("invalid proxy endpoint: {0}")]
    Endpoint(String),
}

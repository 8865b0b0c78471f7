//! Error types for the engine layer.

use viaduct_types::InvalidDatabaseId;

/// Errors that can occur when resolving or driving an engine instance.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No engine runtime is loaded in the current execution environment.
    ///
    /// Local hosting is disabled (or impossible); callers should degrade to
    /// "no instance available" rather than treating this as fatal.
    #[error("no local engine runtime is available in this environment")]
    Unavailable,

    /// Engine construction failed. The failed attempt is not cached, so a
    /// subsequent lookup for the same identifier retries construction.
    #[error("failed to instantiate engine instance {id:?}: {reason}")]
    Instantiation {
        /// Identifier the construction was attempted for.
        id: String,
        /// Underlying failure.
        reason: String,
    },

    /// The caller-supplied identifier failed validation.
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidDatabaseId),

    /// An engine-level execution failure that the wire protocol cannot
    /// represent in-band (pool exhaustion, task join failure). Statement
    /// failures are representable and travel as `error` response frames
    /// instead.
    #[error("engine execution failed: {0}")]
    Execution(String),
}

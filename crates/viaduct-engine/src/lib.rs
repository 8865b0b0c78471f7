//! Locally-hosted database engines for the Viaduct bridge.
//!
//! Provides the [`InstanceRegistry`] — the single source of truth for
//! locally-hosted engine instances, keyed by identifier — and the
//! [`EngineInstance`] raw-protocol entry point the relay hands frames to.
//! Each instance is a SQLite database file opened through an `r2d2`
//! connection pool in WAL mode.
//!
//! # Design decisions
//!
//! - **SQLite as the engine**: no external database process is required; an
//!   instance is just a pooled handle over `{data_dir}/{id}.db`.
//! - **Single-flight creation**: concurrent `get_instance` calls for the same
//!   identifier converge on one construction via a per-id `tokio::sync::OnceCell`.
//!   A failed construction leaves the cell empty, so a later call retries.
//! - **Opaque frames**: callers hand [`EngineInstance::execute_raw`] a
//!   complete request frame and get back a complete response frame. The wire
//!   format (UTF-8 SQL in, JSON result out) is defined in [`wire`] and is
//!   interpreted only here and by the remote peer — never by the bridge.

mod error;
mod instance;
mod registry;
mod runtime;
pub mod wire;

pub use error::EngineError;
pub use instance::EngineInstance;
pub use registry::InstanceRegistry;
pub use runtime::{EngineRuntime, EngineSettings};

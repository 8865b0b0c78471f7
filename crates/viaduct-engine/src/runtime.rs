//! The engine runtime: the linked SQLite library plus the data directory in
//! which instances live.

use crate::{EngineError, EngineInstance};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runtime tunables for engine instance connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections per instance.
    pub pool_max_size: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        }
    }
}

/// Capability to host database engines locally.
///
/// Constructed once at startup when the environment supports local hosting;
/// environments without it build the registry with no runtime instead, and
/// every engine operation degrades to [`EngineError::Unavailable`].
#[derive(Debug)]
pub struct EngineRuntime {
    data_dir: PathBuf,
    settings: EngineSettings,
}

impl EngineRuntime {
    /// Creates a runtime rooted at `data_dir`. The directory is created
    /// lazily on first instance construction.
    pub fn new(data_dir: impl Into<PathBuf>, settings: EngineSettings) -> Self {
        Self {
            data_dir: data_dir.into(),
            settings,
        }
    }

    /// The directory holding instance database files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Build version of the underlying engine implementation.
    pub fn version(&self) -> &'static str {
        rusqlite::version()
    }

    /// Constructs a new instance for `id`. Potentially expensive; the
    /// registry calls this at most once per identifier (single-flight).
    pub(crate) async fn create_instance(
        &self,
        id: &str,
    ) -> Result<Arc<EngineInstance>, EngineError> {
        let data_dir = self.data_dir.clone();
        let id_owned = id.to_string();
        let settings = self.settings;

        let result = tokio::task::spawn_blocking(move || {
            EngineInstance::open(&data_dir, &id_owned, settings)
        })
        .await;

        match result {
            Ok(instance) => instance.map(Arc::new),
            Err(e) => Err(EngineError::Instantiation {
                id: id.to_string(),
                reason: format!("task join error: {}", e),
            }),
        }
    }
}

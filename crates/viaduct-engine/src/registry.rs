//! The process-wide engine instance registry.

use crate::{EngineError, EngineInstance, EngineRuntime};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

type InstanceCell = Arc<OnceCell<Arc<EngineInstance>>>;

/// The single source of truth for locally-hosted engine instances.
///
/// Constructed once at process start and passed by `Arc` to every consumer;
/// no other component caches instances independently. Lookups are
/// single-flight per identifier: concurrent callers racing on an
/// un-constructed id all converge on the same instance, and construction
/// runs at most once per success.
pub struct InstanceRegistry {
    runtime: Option<Arc<EngineRuntime>>,
    /// Sync lock for brief map operations only; construction always happens
    /// outside it, on the per-id cell.
    instances: Mutex<HashMap<String, InstanceCell>>,
}

impl InstanceRegistry {
    /// Creates a registry. `None` models an execution environment without
    /// local engine hosting support.
    pub fn new(runtime: Option<EngineRuntime>) -> Self {
        Self {
            runtime: runtime.map(Arc::new),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the existing instance for `id`, constructing and caching it on
    /// first request.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidIdentifier`] if `id` is not a valid identifier.
    /// - [`EngineError::Unavailable`] if no engine runtime is loaded.
    /// - [`EngineError::Instantiation`] if construction fails; the failure is
    ///   not cached and a subsequent call retries.
    pub async fn get_instance(&self, id: &str) -> Result<Arc<EngineInstance>, EngineError> {
        viaduct_types::validate_database_id(id)?;

        let runtime = self.runtime.as_ref().ok_or(EngineError::Unavailable)?;

        let cell = {
            // A poisoned lock only means another thread panicked during a map
            // operation; the map itself is left consistent.
            let mut instances = self
                .instances
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            instances.entry(id.to_string()).or_default().clone()
        };

        let instance = cell
            .get_or_try_init(|| runtime.create_instance(id))
            .await?;
        Ok(instance.clone())
    }

    /// Build version of the underlying engine implementation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] if no engine runtime is loaded in
    /// the current execution environment.
    pub fn runtime_version(&self) -> Result<String, EngineError> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.version().to_string()),
            None => Err(EngineError::Unavailable),
        }
    }

    /// Number of fully constructed instances currently cached.
    pub fn instance_count(&self) -> usize {
        let instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        instances.values().filter(|cell| cell.initialized()).count()
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("hosting_available", &self.runtime.is_some())
            .field("instances", &self.instance_count())
            .finish()
    }
}

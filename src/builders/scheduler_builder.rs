//! Builds a scheduler from configuration.

use crate::config::{SchedulerConfig, StoreBackendConfig};
use crate::core::{ActionRegistry, ResourceLedger, Scheduler, SchedulerError, Spawn, TaskStore};
use crate::infra::{FileBackend, InMemoryBackend};

/// Open the task store selected by `cfg`.
///
/// # Errors
/// [`SchedulerError::BackendUnavailable`] if the file store cannot be opened.
pub fn build_store(cfg: &StoreBackendConfig) -> Result<TaskStore, SchedulerError> {
    let store = match cfg {
        StoreBackendConfig::InMemory => TaskStore::new(Box::new(InMemoryBackend::new())),
        StoreBackendConfig::File { path } => TaskStore::new(Box::new(FileBackend::open(path)?)),
    };
    Ok(store)
}

/// Validate `cfg`, open its store and create a scheduler that has recovered
/// persisted state. The decision loop is not started.
///
/// # Errors
/// [`SchedulerError::InvalidConfig`] or a store failure.
pub fn build_scheduler<S>(
    cfg: &SchedulerConfig,
    registry: ActionRegistry,
    spawner: S,
) -> Result<Scheduler<S>, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate()?;
    let store = build_store(&cfg.store)?;
    tracing::info!(cpu = cfg.cpu, ram = cfg.ram, store = ?cfg.store, "building scheduler");
    Ok(Scheduler::new(
        ResourceLedger::new(cfg.cpu, cfg.ram),
        store,
        registry,
        cfg.options(),
        spawner,
    ))
}

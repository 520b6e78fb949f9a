//! Registry of action factories keyed by job kind.
//!
//! Persisted tasks carry a [`JobSpec`] rather than a live action; after a
//! restart the scheduler rebuilds the action through this registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{Action, AppResult, JobSpec, SchedulerError};

type Factory = Arc<dyn Fn(&JobSpec) -> AppResult<Arc<dyn Action>> + Send + Sync>;

/// Maps a job kind to a factory producing the action for it.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    factories: HashMap<String, Factory>,
}

impl ActionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`, replacing any previous one.
    #[must_use]
    pub fn with<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&JobSpec) -> AppResult<Arc<dyn Action>> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    /// Register a factory for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&JobSpec) -> AppResult<Arc<dyn Action>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Whether a factory exists for `kind`.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build the action described by `job`.
    ///
    /// # Errors
    /// [`SchedulerError::UnknownAction`] if the kind is not registered or the
    /// factory rejects the parameters.
    pub fn build(&self, job: &JobSpec) -> Result<Arc<dyn Action>, SchedulerError> {
        let factory = self
            .factories
            .get(&job.kind)
            .ok_or_else(|| SchedulerError::UnknownAction(job.kind.clone()))?;
        factory(job).map_err(|e| SchedulerError::UnknownAction(format!("{}: {e:#}", job.kind)))
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("ActionRegistry").field("kinds", &kinds).finish()
    }
}

//! Task persistence: the key-value backend contract and the task codec on top.

use crate::core::{SchedulerError, Task};
use crate::util::ids::TaskId;

/// Abstraction for key-value backends holding serialized task records.
///
/// Values are opaque bytes; [`TaskStore`] owns the encoding. Mutating methods
/// take `&mut self` because the scheduler only calls them under its write
/// guard.
pub trait KvBackend: Send + Sync {
    /// Fetch a value.
    ///
    /// # Errors
    /// [`SchedulerError::BackendUnavailable`] on I/O failure.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SchedulerError>;
    /// Insert or replace a value.
    ///
    /// # Errors
    /// [`SchedulerError::BackendUnavailable`] on I/O failure.
    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), SchedulerError>;
    /// Remove a key; removing a missing key is not an error.
    ///
    /// # Errors
    /// [`SchedulerError::BackendUnavailable`] on I/O failure.
    fn delete(&mut self, key: &str) -> Result<(), SchedulerError>;
    /// Visit every entry. Stops at the first error returned by `visit`.
    ///
    /// # Errors
    /// Whatever `visit` returns, or a backend failure.
    fn for_each(
        &self,
        visit: &mut dyn FnMut(&str, &[u8]) -> Result<(), SchedulerError>,
    ) -> Result<(), SchedulerError>;
    /// Remove every entry for which `clause` returns true; returns the count.
    ///
    /// # Errors
    /// [`SchedulerError::BackendUnavailable`] on I/O failure.
    fn delete_with_clause(
        &mut self,
        clause: &mut dyn FnMut(&str, &[u8]) -> bool,
    ) -> Result<usize, SchedulerError>;
    /// Number of entries.
    fn len(&self) -> usize;
    /// Whether the backend holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn encode(task: &Task) -> Result<Vec<u8>, SchedulerError> {
    serde_json::to_vec(task).map_err(|e| SchedulerError::SerializationFailure(e.to_string()))
}

fn decode(value: &[u8]) -> Result<Task, SchedulerError> {
    serde_json::from_slice(value).map_err(|e| SchedulerError::SerializationFailure(e.to_string()))
}

/// JSON codec for tasks over any [`KvBackend`].
pub struct TaskStore {
    backend: Box<dyn KvBackend>,
}

impl TaskStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Box<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Load a task.
    ///
    /// # Errors
    /// Backend failure, or [`SchedulerError::SerializationFailure`] for a
    /// corrupt record.
    pub fn get(&self, id: TaskId) -> Result<Option<Task>, SchedulerError> {
        self.backend
            .get(&id.to_string())?
            .map(|value| decode(&value))
            .transpose()
    }

    /// Insert or replace a task. The task must have an id.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidDemand`] for a task without id, encoding or
    /// backend failures otherwise.
    pub fn put(&mut self, task: &Task) -> Result<(), SchedulerError> {
        let id = task
            .id
            .ok_or_else(|| SchedulerError::InvalidDemand("task without id".into()))?;
        let value = encode(task)?;
        self.backend.put(&id.to_string(), value)
    }

    /// Remove a task.
    ///
    /// # Errors
    /// Backend failure.
    pub fn delete(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        self.backend.delete(&id.to_string())
    }

    /// Visit every task.
    ///
    /// # Errors
    /// The first decode failure, or whatever `visit` returns.
    pub fn for_each<F>(&self, mut visit: F) -> Result<(), SchedulerError>
    where
        F: FnMut(Task) -> Result<(), SchedulerError>,
    {
        self.backend.for_each(&mut |_key, value| visit(decode(value)?))
    }

    /// Decode every task, skipping corrupt records with a warning.
    #[must_use]
    pub fn load_all(&self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.backend.len());
        let walk = self.backend.for_each(&mut |key, value| {
            match decode(value) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::warn!(key, error = %e, "skipping corrupt task record"),
            }
            Ok(())
        });
        if let Err(e) = walk {
            tracing::error!(error = %e, "task store iteration failed");
        }
        tasks
    }

    /// Delete every task matching `clause`. Corrupt records are kept.
    ///
    /// # Errors
    /// Backend failure.
    pub fn delete_with_clause<F>(&mut self, mut clause: F) -> Result<usize, SchedulerError>
    where
        F: FnMut(&Task) -> bool,
    {
        self.backend.delete_with_clause(&mut |key, value| match decode(value) {
            Ok(task) => clause(&task),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt task record kept by clause delete");
                false
            }
        })
    }

    /// Number of stored tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskStatus;
    use crate::infra::store::InMemoryBackend;
    use std::time::Duration;

    fn admitted(owner: &str) -> Task {
        let mut task = Task::new(owner, 1, 128, Duration::from_secs(5));
        task.id = Some(TaskId::new_v4());
        task
    }

    #[test]
    fn test_put_get_delete() {
        let mut store = TaskStore::new(Box::new(InMemoryBackend::new()));
        let task = admitted("alice");
        let id = task.id.unwrap();

        store.put(&task).unwrap();
        assert_eq!(store.len(), 1);
        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.owner, "alice");
        assert_eq!(loaded.status, TaskStatus::Waiting);

        store.delete(id).unwrap();
        assert!(store.get(id).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_requires_id() {
        let mut store = TaskStore::new(Box::new(InMemoryBackend::new()));
        let task = Task::new("bob", 1, 1, Duration::from_secs(1));
        assert!(matches!(store.put(&task), Err(SchedulerError::InvalidDemand(_))));
    }

    #[test]
    fn test_corrupt_record_surfaces_as_serialization_failure() {
        let mut backend = InMemoryBackend::new();
        let id = TaskId::new_v4();
        backend.put(&id.to_string(), b"{not json".to_vec()).unwrap();
        let mut store = TaskStore::new(Box::new(backend));

        assert!(matches!(store.get(id), Err(SchedulerError::SerializationFailure(_))));
        assert!(store.for_each(|_| Ok(())).is_err());
        assert!(store.load_all().is_empty());

        let good = admitted("carol");
        store.put(&good).unwrap();
        assert_eq!(store.load_all().len(), 1);
        // Clause delete never removes the unreadable record.
        assert_eq!(store.delete_with_clause(|_| true).unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_with_clause() {
        let mut store = TaskStore::new(Box::new(InMemoryBackend::new()));
        for owner in ["a", "b", "a", "c"] {
            store.put(&admitted(owner)).unwrap();
        }
        let removed = store.delete_with_clause(|t| t.owner == "a").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 2);

        let mut owners = Vec::new();
        store
            .for_each(|t| {
                owners.push(t.owner);
                Ok(())
            })
            .unwrap();
        owners.sort();
        assert_eq!(owners, vec!["b", "c"]);
    }
}

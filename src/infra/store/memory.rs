//! In-memory key-value backend, lost when the process exits.

use std::collections::HashMap;

use crate::core::{KvBackend, SchedulerError};

/// Volatile backend for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: HashMap<String, Vec<u8>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for InMemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SchedulerError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), SchedulerError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), SchedulerError> {
        self.entries.remove(key);
        Ok(())
    }

    fn for_each(
        &self,
        visit: &mut dyn FnMut(&str, &[u8]) -> Result<(), SchedulerError>,
    ) -> Result<(), SchedulerError> {
        for (key, value) in &self.entries {
            visit(key.as_str(), value.as_slice())?;
        }
        Ok(())
    }

    fn delete_with_clause(
        &mut self,
        clause: &mut dyn FnMut(&str, &[u8]) -> bool,
    ) -> Result<usize, SchedulerError> {
        let before = self.entries.len();
        self.entries.retain(|key, value| !clause(key.as_str(), value.as_slice()));
        Ok(before - self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

//! File-backed key-value backend.
//!
//! Every mutation is appended to a JSON-lines log and synced before the call
//! returns. The log is replayed into memory on open and compacted (rewritten
//! with one `put` per live key) when it carries more dead records than live
//! ones, and after bulk deletes. Values must be UTF-8, which holds for the
//! JSON records written by the task store.

use std::collections::BTreeMap;
use std::fs::{self, create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{KvBackend, SchedulerError};

/// One line of the log.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogRecord {
    Put { key: String, value: String },
    Delete { key: String },
}

fn io_err(e: &std::io::Error) -> SchedulerError {
    SchedulerError::BackendUnavailable(e.to_string())
}

/// Durable backend surviving process restarts.
pub struct FileBackend {
    path: PathBuf,
    file: File,
    entries: BTreeMap<String, String>,
    records: usize,
}

impl FileBackend {
    /// Open (or create) the log at `path`, replaying existing records.
    ///
    /// # Errors
    /// [`SchedulerError::BackendUnavailable`] if the file or its parent
    /// directory cannot be created or read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| io_err(&e))?;
        }
        let (entries, records, skipped) = Self::replay(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&e))?;
        let mut backend = Self {
            path,
            file,
            entries,
            records,
        };
        // Rewriting also drops a torn tail so later appends start on a fresh line.
        if skipped > 0 || backend.records > backend.entries.len() * 2 {
            backend.compact()?;
        }
        tracing::debug!(
            path = %backend.path.display(),
            entries = backend.entries.len(),
            "file backend opened"
        );
        Ok(backend)
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(path: &Path) -> Result<(BTreeMap<String, String>, usize, usize), SchedulerError> {
        let mut entries = BTreeMap::new();
        let mut records = 0;
        let mut skipped = 0;
        if !path.exists() {
            return Ok((entries, records, skipped));
        }
        let file = File::open(path).map_err(|e| io_err(&e))?;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_err(&e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogRecord>(&line) {
                Ok(LogRecord::Put { key, value }) => {
                    entries.insert(key, value);
                }
                Ok(LogRecord::Delete { key }) => {
                    entries.remove(&key);
                }
                // A torn final write after a crash lands here.
                Err(e) => {
                    tracing::warn!(line = lineno + 1, error = %e, "skipping unreadable log record");
                    skipped += 1;
                    continue;
                }
            }
            records += 1;
        }
        Ok((entries, records, skipped))
    }

    fn append(&mut self, record: &LogRecord) -> Result<(), SchedulerError> {
        let line = serde_json::to_string(record)
            .map_err(|e| SchedulerError::SerializationFailure(e.to_string()))?;
        writeln!(self.file, "{line}").map_err(|e| io_err(&e))?;
        self.file.sync_data().map_err(|e| io_err(&e))?;
        self.records += 1;
        Ok(())
    }

    /// Rewrite the log with one record per live key.
    ///
    /// # Errors
    /// [`SchedulerError::BackendUnavailable`] on I/O failure; the previous
    /// log is left in place in that case.
    pub fn compact(&mut self) -> Result<(), SchedulerError> {
        let entries = self.entries.clone();
        self.rewrite(&entries)
    }

    /// Replace the log with `entries`. The swap happens by rename, so on
    /// failure both the log and the in-memory view are unchanged.
    fn rewrite(&mut self, entries: &BTreeMap<String, String>) -> Result<(), SchedulerError> {
        let tmp = self.path.with_extension("compact");
        {
            let mut out = File::create(&tmp).map_err(|e| io_err(&e))?;
            for (key, value) in entries {
                let line = serde_json::to_string(&LogRecord::Put {
                    key: key.clone(),
                    value: value.clone(),
                })
                .map_err(|e| SchedulerError::SerializationFailure(e.to_string()))?;
                writeln!(out, "{line}").map_err(|e| io_err(&e))?;
            }
            out.sync_all().map_err(|e| io_err(&e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| io_err(&e))?;
        self.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&e))?;
        self.entries.clone_from(entries);
        self.records = self.entries.len();
        tracing::debug!(path = %self.path.display(), entries = self.records, "file backend compacted");
        Ok(())
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SchedulerError> {
        Ok(self.entries.get(key).map(|v| v.clone().into_bytes()))
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), SchedulerError> {
        let value = String::from_utf8(value)
            .map_err(|e| SchedulerError::SerializationFailure(e.to_string()))?;
        self.append(&LogRecord::Put {
            key: key.to_owned(),
            value: value.clone(),
        })?;
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), SchedulerError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.append(&LogRecord::Delete { key: key.to_owned() })?;
        self.entries.remove(key);
        Ok(())
    }

    fn for_each(
        &self,
        visit: &mut dyn FnMut(&str, &[u8]) -> Result<(), SchedulerError>,
    ) -> Result<(), SchedulerError> {
        for (key, value) in &self.entries {
            visit(key.as_str(), value.as_bytes())?;
        }
        Ok(())
    }

    fn delete_with_clause(
        &mut self,
        clause: &mut dyn FnMut(&str, &[u8]) -> bool,
    ) -> Result<usize, SchedulerError> {
        let before = self.entries.len();
        let kept: BTreeMap<String, String> = self
            .entries
            .iter()
            .filter(|(key, value)| !clause(key.as_str(), value.as_bytes()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }
        self.rewrite(&kept)?;
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

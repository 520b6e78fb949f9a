//! Scheduler configuration structures.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{SchedulerError, SchedulerOptions};

/// Prefix of every environment variable read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "BATCH_SCHEDULER_";

/// RAM megabytes assumed when none is configured.
pub const DEFAULT_RAM_MB: u32 = 2048;

/// Task store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// In-memory store; state is lost on exit.
    #[default]
    InMemory,
    /// Append-only log file surviving restarts.
    File {
        /// Log location.
        path: PathBuf,
    },
}

const fn default_event_capacity() -> usize {
    1024
}

const fn default_min_rearm_ms() -> u64 {
    50
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Total CPU cores.
    pub cpu: u32,
    /// Total RAM megabytes.
    pub ram: u32,
    /// Task store backend.
    #[serde(default)]
    pub store: StoreBackendConfig,
    /// Capacity of the lifecycle event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Smallest delay for the start-time timer, in milliseconds.
    #[serde(default = "default_min_rearm_ms")]
    pub min_rearm_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cpu: u32::try_from(num_cpus::get()).unwrap_or(u32::MAX),
            ram: DEFAULT_RAM_MB,
            store: StoreBackendConfig::default(),
            event_capacity: default_event_capacity(),
            min_rearm_ms: default_min_rearm_ms(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidConfig(msg.into())
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, SchedulerError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| invalid(format!("{ENV_PREFIX}{key}: {e}")))
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.cpu == 0 {
            return Err(invalid("cpu must be greater than 0"));
        }
        if self.ram == 0 {
            return Err(invalid("ram must be greater than 0"));
        }
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity must be greater than 0"));
        }
        if self.min_rearm_ms == 0 {
            return Err(invalid("min_rearm_ms must be greater than 0"));
        }
        if let StoreBackendConfig::File { path } = &self.store {
            if path.as_os_str().is_empty() {
                return Err(invalid("store path must not be empty"));
            }
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidConfig`] on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| invalid(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read configuration from the environment, loading `.env` first when
    /// present. Unset variables keep their defaults; CPU defaults to the
    /// number of logical cores.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidConfig`] for unparsable or invalid values.
    pub fn from_env() -> Result<Self, SchedulerError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Build configuration from a variable lookup keyed by the name without
    /// prefix (`CPU`, `RAM`, `STORE_PATH`, `EVENT_CAPACITY`, `MIN_REARM_MS`).
    ///
    /// # Errors
    /// [`SchedulerError::InvalidConfig`] for unparsable or invalid values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup("CPU") {
            cfg.cpu = parse_var("CPU", &raw)?;
        }
        if let Some(raw) = lookup("RAM") {
            cfg.ram = parse_var("RAM", &raw)?;
        }
        if let Some(raw) = lookup("STORE_PATH").filter(|raw| !raw.trim().is_empty()) {
            cfg.store = StoreBackendConfig::File {
                path: PathBuf::from(raw.trim()),
            };
        }
        if let Some(raw) = lookup("EVENT_CAPACITY") {
            cfg.event_capacity = parse_var("EVENT_CAPACITY", &raw)?;
        }
        if let Some(raw) = lookup("MIN_REARM_MS") {
            cfg.min_rearm_ms = parse_var("MIN_REARM_MS", &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Decision loop tunables.
    #[must_use]
    pub const fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            event_capacity: self.event_capacity,
            min_rearm: Duration::from_millis(self.min_rearm_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_defaults() {
        let cfg = SchedulerConfig::from_json_str(r#"{"cpu": 4, "ram": 8192}"#).unwrap();
        assert_eq!(cfg.store, StoreBackendConfig::InMemory);
        assert_eq!(cfg.event_capacity, 1024);
        assert_eq!(cfg.options().min_rearm, Duration::from_millis(50));
    }

    #[test]
    fn test_json_file_store() {
        let cfg = SchedulerConfig::from_json_str(
            r#"{"cpu": 2, "ram": 512, "store": {"kind": "file", "path": "/tmp/tasks.jsonl"}}"#,
        )
        .unwrap();
        assert_eq!(
            cfg.store,
            StoreBackendConfig::File {
                path: PathBuf::from("/tmp/tasks.jsonl")
            }
        );
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> =
            [("CPU", "3"), ("RAM", " 1024 "), ("STORE_PATH", "/var/lib/tasks.jsonl")].into();
        let cfg = SchedulerConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
        assert_eq!(cfg.cpu, 3);
        assert_eq!(cfg.ram, 1024);
        assert!(matches!(cfg.store, StoreBackendConfig::File { .. }));
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = SchedulerConfig::from_lookup(|key| (key == "RAM").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("BATCH_SCHEDULER_RAM"));
    }
}

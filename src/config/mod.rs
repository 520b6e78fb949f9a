//! Configuration models for capacity, store backend and loop tunables.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, StoreBackendConfig, DEFAULT_RAM_MB, ENV_PREFIX};

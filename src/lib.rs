//! # Batch Scheduler
//!
//! A single-node batch job scheduler with CPU/RAM admission control.
//!
//! Callers submit tasks that declare a CPU and RAM demand, an earliest start
//! time, a maximum execution time and an action to run. The scheduler keeps
//! running tasks within a fixed capacity, launches ready tasks in ascending
//! karma order, enforces deadlines through cooperative cancellation and
//! persists every task record so a restart can recover pending work.
//!
//! ## Key Features
//!
//! - **Resource Ledger**: running demand never exceeds the configured totals
//! - **Karma Ordering**: `(cpu × ram) / max_execution_time`, cheapest first,
//!   compared exactly
//! - **Deferred Starts**: tasks wait for their start time, woken by a timer
//! - **Cooperative Deadlines**: actions observe an [`core::ExecutionContext`]
//!   that is cancelled at the deadline or on request
//! - **Persistence**: in-memory or append-only file store, with recovery of
//!   waiting tasks on construction
//! - **Lifecycle Events**: every transition is broadcast on an event bus
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use batch_scheduler::builders::build_scheduler;
//! use batch_scheduler::config::SchedulerConfig;
//! use batch_scheduler::core::{Task, TaskStatus};
//! use batch_scheduler::runtime::{default_registry, SleepAction, TokioSpawner};
//!
//! let cfg = SchedulerConfig::from_json_str(r#"{"cpu": 4, "ram": 4096}"#)?;
//! let scheduler = build_scheduler(&cfg, default_registry(), TokioSpawner::current())?;
//! scheduler.start();
//!
//! let id = scheduler.add(
//!     Task::new("alice", 2, 512, Duration::from_secs(30))
//!         .with_action(Arc::new(SleepAction::new(Duration::from_millis(200)))),
//! )?;
//! assert_eq!(scheduler.wait_terminal(id).await?, TaskStatus::Done);
//! scheduler.shutdown().await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for capacity, store backend and loop tunables.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for task storage backends.
pub mod infra;
/// Runtime adapters, built-in actions and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

//! Core scheduling abstractions and capacity accounting.

pub mod error;
pub mod events;
pub mod executor;
pub mod ledger;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod task;

pub use error::{AppResult, SchedulerError};
pub use events::{EventBus, LifecycleEvent};
pub use executor::{Action, ExecutionContext};
pub use ledger::{LedgerSnapshot, ResourceLedger};
pub use registry::ActionRegistry;
pub use scheduler::{Scheduler, SchedulerOptions, Spawn};
pub use store::{KvBackend, TaskStore};
pub use task::{karma_cmp, start_cmp, JobSpec, Task, TaskStatus};

//! Runtime adapters, built-in actions and API surface.

pub mod actions;
pub mod api;
pub mod tokio_spawner;

pub use actions::{default_registry, CommandAction, SleepAction};
pub use api::{cancel_task, health, list_tasks, submit_task, Health, TaskSubmission, TaskView};
pub use tokio_spawner::TokioSpawner;

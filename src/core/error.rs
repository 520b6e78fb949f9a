//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::TaskStatus;
use crate::util::ids::TaskId;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// CPU or RAM demand is zero.
    #[error("invalid demand: {0}")]
    InvalidDemand(String),
    /// Demand exceeds the total capacity of the ledger.
    #[error("insufficient capacity: {resource} requested {requested}, total {total}")]
    InsufficientCapacity {
        /// Resource name (`cpu` or `ram`).
        resource: &'static str,
        /// Units requested by the task.
        requested: u32,
        /// Total units managed by the ledger.
        total: u32,
    },
    /// Maximum execution time is zero.
    #[error("invalid deadline: max execution time must be greater than 0")]
    InvalidDeadline,
    /// Caller supplied an identifier; the scheduler assigns them.
    #[error("task already has an id: {0}")]
    AlreadyAssigned(TaskId),
    /// No task with this identifier.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// Status change not allowed by the task state machine.
    #[error("invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        /// Task identifier.
        id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
    /// No action factory registered for the job kind.
    #[error("unknown action kind: {0}")]
    UnknownAction(String),
    /// Persisted record is corrupt or unreadable.
    #[error("serialization failure: {0}")]
    SerializationFailure(String),
    /// Store I/O failure.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// Configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

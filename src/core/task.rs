//! Task entity, lifecycle state machine and ordering comparators.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Action, SchedulerError};
use crate::util::clock::now;
use crate::util::ids::{duration_ms, TaskId};

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Admitted, waiting for its start time and for capacity.
    Waiting,
    /// Resources reserved and action launched.
    Running,
    /// Action returned successfully.
    Done,
    /// Deadline exceeded or cancellation requested.
    Canceled,
    /// Action reported a failure, or the task could not be launched.
    Error,
}

impl TaskStatus {
    /// Terminal statuses never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Canceled | Self::Error)
    }

    /// Whether the state machine allows `self -> next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Running | Self::Canceled | Self::Error)
                | (Self::Running, Self::Done | Self::Canceled | Self::Error)
        )
    }

    /// Status name as published on the event bus.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Canceled => "Canceled",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable job description used to rebuild an action after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Registered action kind, e.g. `sleep` or `command`.
    pub kind: String,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl JobSpec {
    /// Build a job description.
    pub fn new(kind: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

/// One schedulable unit of work.
///
/// Everything except `action` is persisted. The action is bound in memory on
/// admission, or rebuilt from `job` through the action registry.
#[derive(Clone, Serialize, Deserialize)]
pub struct Task {
    /// Assigned by the scheduler on admission; callers leave it `None`.
    pub id: Option<TaskId>,
    /// Caller identity, used for filtering.
    pub owner: String,
    /// CPU cores required.
    pub cpu: u32,
    /// RAM megabytes required.
    pub ram: u32,
    /// Earliest time the task may start.
    pub start: DateTime<Utc>,
    /// Deadline once running.
    #[serde(with = "duration_ms")]
    pub max_execution_time: Duration,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Last status change.
    pub mtime: DateTime<Utc>,
    /// Optional job description for rebuilding the action.
    #[serde(default)]
    pub job: Option<JobSpec>,
    /// Bound unit of work.
    #[serde(skip)]
    pub action: Option<Arc<dyn Action>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("cpu", &self.cpu)
            .field("ram", &self.ram)
            .field("start", &self.start)
            .field("max_execution_time", &self.max_execution_time)
            .field("status", &self.status)
            .field("mtime", &self.mtime)
            .field("job", &self.job)
            .field("action", &self.action.as_ref().map(|a| a.name()))
            .finish()
    }
}

impl Task {
    /// New unadmitted task starting now.
    pub fn new(owner: impl Into<String>, cpu: u32, ram: u32, max_execution_time: Duration) -> Self {
        let created = now();
        Self {
            id: None,
            owner: owner.into(),
            cpu,
            ram,
            start: created,
            max_execution_time,
            status: TaskStatus::Waiting,
            mtime: created,
            job: None,
            action: None,
        }
    }

    /// Set the earliest start time.
    #[must_use]
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Bind the action to run.
    #[must_use]
    pub fn with_action(mut self, action: Arc<dyn Action>) -> Self {
        self.action = Some(action);
        self
    }

    /// Attach a job description.
    #[must_use]
    pub fn with_job(mut self, job: JobSpec) -> Self {
        self.job = Some(job);
        self
    }

    /// Move to `next`, stamping `mtime`.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidTransition`] when the state machine forbids
    /// the move (including any move out of a terminal status).
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulerError::InvalidTransition {
                id: self.id.unwrap_or_else(|| TaskId::from(uuid::Uuid::nil())),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.mtime = now();
        Ok(())
    }

    /// Whether the start time has been reached.
    #[must_use]
    pub fn is_startable(&self, at: DateTime<Utc>) -> bool {
        self.start <= at
    }

    /// `cpu * ram`, the numerator of the karma score.
    #[must_use]
    pub fn weight(&self) -> u64 {
        u64::from(self.cpu) * u64::from(self.ram)
    }

    /// Karma as a float, for logging only. Ordering uses [`karma_cmp`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn karma(&self) -> f64 {
        let ms = self.max_execution_time.as_millis().max(1) as f64;
        self.weight() as f64 / ms
    }
}

/// Millisecond deadline clamped into `1..=u64::MAX`.
fn deadline_ms(task: &Task) -> u64 {
    u64::try_from(task.max_execution_time.as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}

/// Compare two tasks by karma, `(cpu × ram) / max_execution_time`, lowest first.
///
/// The fractions are compared by cross-multiplication: a `u64` weight times a
/// `u64` millisecond count always fits in `u128`, so no precision is lost.
/// Ties fall back to earlier `start`, then to id.
#[must_use]
pub fn karma_cmp(a: &Task, b: &Task) -> Ordering {
    let lhs = u128::from(a.weight()) * u128::from(deadline_ms(b));
    let rhs = u128::from(b.weight()) * u128::from(deadline_ms(a));
    lhs.cmp(&rhs)
        .then_with(|| a.start.cmp(&b.start))
        .then_with(|| a.id.cmp(&b.id))
}

/// Compare two tasks by earliest start.
#[must_use]
pub fn start_cmp(a: &Task, b: &Task) -> Ordering {
    a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id))
}

//! API-facing request/response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{JobSpec, LedgerSnapshot, Scheduler, SchedulerError, Spawn, Task, TaskStatus};
use crate::util::ids::TaskId;

/// Task submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Caller identity.
    pub owner: String,
    /// CPU cores required.
    pub cpu: u32,
    /// RAM megabytes required.
    pub ram: u32,
    /// Earliest start; now when absent.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Deadline once running, in milliseconds.
    pub max_execution_time_ms: u64,
    /// Job to run.
    pub job: JobSpec,
}

impl TaskSubmission {
    /// Convert into an unadmitted task.
    #[must_use]
    pub fn into_task(self) -> Task {
        let task = Task::new(
            self.owner,
            self.cpu,
            self.ram,
            std::time::Duration::from_millis(self.max_execution_time_ms),
        )
        .with_job(self.job);
        match self.start {
            Some(start) => task.with_start(start),
            None => task,
        }
    }
}

/// Task as returned to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task identifier.
    pub id: TaskId,
    /// Caller identity.
    pub owner: String,
    /// CPU cores required.
    pub cpu: u32,
    /// RAM megabytes required.
    pub ram: u32,
    /// Earliest start.
    pub start: DateTime<Utc>,
    /// Deadline once running, in milliseconds.
    pub max_execution_time_ms: u64,
    /// Current status.
    pub status: TaskStatus,
    /// Last status change.
    pub mtime: DateTime<Utc>,
    /// Job kind, when the task carries a job description.
    pub kind: Option<String>,
}

impl TaskView {
    /// View of an admitted task; `None` for a task without id.
    #[must_use]
    pub fn from_task(task: &Task) -> Option<Self> {
        Some(Self {
            id: task.id?,
            owner: task.owner.clone(),
            cpu: task.cpu,
            ram: task.ram,
            start: task.start,
            max_execution_time_ms: u64::try_from(task.max_execution_time.as_millis())
                .unwrap_or(u64::MAX),
            status: task.status,
            mtime: task.mtime,
            kind: task.job.as_ref().map(|job| job.kind.clone()),
        })
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Number of stored tasks.
    pub tasks: usize,
    /// Ledger counters.
    pub resources: LedgerSnapshot,
}

fn view(task: &Task) -> Result<TaskView, SchedulerError> {
    TaskView::from_task(task).ok_or_else(|| SchedulerError::InvalidDemand("task without id".into()))
}

/// Admit a submission and return its stored view.
///
/// # Errors
/// Any admission error from [`Scheduler::add`].
pub fn submit_task<S>(scheduler: &Scheduler<S>, req: TaskSubmission) -> Result<TaskView, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let id = scheduler.add(req.into_task())?;
    view(&scheduler.get(id)?)
}

/// Cancel a task and return its view after the request.
///
/// # Errors
/// [`SchedulerError::NotFound`] for an unknown id.
pub fn cancel_task<S>(scheduler: &Scheduler<S>, id: TaskId) -> Result<TaskView, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    scheduler.cancel(id)?;
    view(&scheduler.get(id)?)
}

/// Views of every task, or of one owner's tasks.
///
/// # Errors
/// [`SchedulerError::SerializationFailure`] for a corrupt record.
pub fn list_tasks<S>(scheduler: &Scheduler<S>, owner: Option<&str>) -> Result<Vec<TaskView>, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let tasks = match owner {
        Some(owner) => scheduler.filter(owner)?,
        None => scheduler.list()?,
    };
    tasks.iter().map(view).collect()
}

/// Return a health payload.
#[must_use]
pub fn health<S>(scheduler: &Scheduler<S>) -> Health
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    Health {
        ok: true,
        tasks: scheduler.length(),
        resources: scheduler.resources(),
    }
}

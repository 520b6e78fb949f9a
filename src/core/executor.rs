//! Action trait and the execution context handed to running tasks.

use std::fmt;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::core::AppResult;
use crate::util::ids::TaskId;

/// Execution context for one launched task.
///
/// The token is owned by the scheduler; it is cancelled when the deadline
/// passes or when the task is cancelled explicitly. Actions observe it and
/// return promptly.
#[derive(Clone)]
pub struct ExecutionContext {
    task_id: TaskId,
    deadline: Instant,
    token: CancellationToken,
}

impl ExecutionContext {
    /// Build a context. The child token shares cancellation with `token`.
    #[must_use]
    pub fn new(task_id: TaskId, deadline: Instant, token: &CancellationToken) -> Self {
        Self {
            task_id,
            deadline,
            token: token.child_token(),
        }
    }

    /// Task being executed.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Instant after which the scheduler cancels the context.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("task_id", &self.task_id)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Abstraction for the work bound to a task.
///
/// The scheduler never forcibly stops an action: on deadline or cancellation
/// it cancels the context and keeps awaiting `run`. An action that ignores
/// the context holds its reserved resources until it returns.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use batch_scheduler::core::{Action, AppResult, ExecutionContext};
///
/// struct Render;
///
/// #[async_trait]
/// impl Action for Render {
///     fn name(&self) -> &str {
///         "render"
///     }
///
///     async fn run(&self, ctx: ExecutionContext) -> AppResult<()> {
///         tokio::select! {
///             () = ctx.cancelled() => Ok(()),
///             () = render_frames() => Ok(()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync + 'static {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Execute the work. `Err` marks the task as `Error`.
    async fn run(&self, ctx: ExecutionContext) -> AppResult<()>;
}

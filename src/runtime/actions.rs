//! Built-in actions and the default registry.
//!
//! - `sleep`: `{"ms": 250, "fail": false}` waits, honouring cancellation.
//! - `command`: `{"program": "sh", "args": ["-c", "..."]}` runs a process;
//!   a non-zero exit is a failure and cancellation kills the child.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::core::{Action, ActionRegistry, AppResult, ExecutionContext, JobSpec};

/// Sleeps for a fixed duration, optionally failing afterwards.
#[derive(Debug, Clone)]
pub struct SleepAction {
    duration: Duration,
    fail: bool,
}

#[derive(Debug, Deserialize)]
struct SleepParams {
    ms: u64,
    #[serde(default)]
    fail: bool,
}

impl SleepAction {
    /// Sleep for `duration` and succeed.
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self {
            duration,
            fail: false,
        }
    }

    /// Report a failure after sleeping.
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Build from job parameters.
    ///
    /// # Errors
    /// Malformed parameters.
    pub fn from_job(job: &JobSpec) -> AppResult<Self> {
        let params: SleepParams =
            serde_json::from_value(job.params.clone()).context("sleep parameters")?;
        Ok(Self {
            duration: Duration::from_millis(params.ms),
            fail: params.fail,
        })
    }
}

#[async_trait]
impl Action for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn run(&self, ctx: ExecutionContext) -> AppResult<()> {
        tokio::select! {
            () = ctx.cancelled() => return Ok(()),
            () = tokio::time::sleep(self.duration) => {}
        }
        if self.fail {
            bail!("sleep finished with requested failure");
        }
        Ok(())
    }
}

/// Runs an external program.
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CommandParams {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

impl CommandAction {
    /// Run `program` with `args`.
    pub fn new<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from job parameters.
    ///
    /// # Errors
    /// Malformed parameters or an empty program name.
    pub fn from_job(job: &JobSpec) -> AppResult<Self> {
        let params: CommandParams =
            serde_json::from_value(job.params.clone()).context("command parameters")?;
        if params.program.trim().is_empty() {
            bail!("program must not be empty");
        }
        Ok(Self::new(params.program, params.args))
    }
}

#[async_trait]
impl Action for CommandAction {
    fn name(&self) -> &str {
        &self.program
    }

    async fn run(&self, ctx: ExecutionContext) -> AppResult<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", self.program))?;
        tracing::debug!(task = %ctx.task_id(), program = %self.program, pid = ?child.id(), "process started");

        tokio::select! {
            status = child.wait() => {
                let status = status.context("waiting for process")?;
                if !status.success() {
                    bail!("{} exited with {status}", self.program);
                }
                Ok(())
            }
            () = ctx.cancelled() => {
                tracing::info!(task = %ctx.task_id(), program = %self.program, "killing process");
                child.kill().await.context("killing process")?;
                Ok(())
            }
        }
    }
}

/// Registry with the `sleep` and `command` kinds.
#[must_use]
pub fn default_registry() -> ActionRegistry {
    ActionRegistry::new()
        .with("sleep", |job| {
            Ok(Arc::new(SleepAction::from_job(job)?) as Arc<dyn Action>)
        })
        .with("command", |job| {
            Ok(Arc::new(CommandAction::from_job(job)?) as Arc<dyn Action>)
        })
}

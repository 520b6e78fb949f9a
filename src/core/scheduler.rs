//! The scheduler: admission, the decision loop, completion handling,
//! cancellation, retention and queries.
//!
//! Shared state (ledger, store, waiting index, bound actions, run handles)
//! sits behind one `parking_lot::RwLock`. Every mutation, including a whole
//! select-reserve-launch pass, happens under the write guard and never across
//! an `.await`. Workers only send a completion message; the decision loop
//! applies it. Wake-ups go through a `tokio::sync::Notify`, which keeps at
//! most one pending permit, so any burst of wake reasons collapses into one
//! re-evaluation from current state.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::{
    karma_cmp, start_cmp, Action, ActionRegistry, EventBus, ExecutionContext, LedgerSnapshot,
    LifecycleEvent, ResourceLedger, SchedulerError, Task, TaskStatus, TaskStore,
};
use crate::util::clock::{now, older_than, until};
use crate::util::ids::TaskId;

/// Abstraction for spawning futures on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Tunables for the decision loop.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
    /// Smallest delay the start-time timer is armed with.
    pub min_rearm: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            min_rearm: Duration::from_millis(50),
        }
    }
}

/// How a launched action ended.
#[derive(Debug)]
enum Outcome {
    Success,
    Failure(String),
    Canceled,
}

impl Outcome {
    const fn status(&self) -> TaskStatus {
        match self {
            Self::Success => TaskStatus::Done,
            Self::Failure(_) => TaskStatus::Error,
            Self::Canceled => TaskStatus::Canceled,
        }
    }
}

#[derive(Debug)]
struct Completion {
    id: TaskId,
    outcome: Outcome,
}

/// Coordinator-owned handle for one running task. `task` is the in-memory
/// `Running` record, authoritative even if its write to the store failed.
struct RunHandle {
    token: CancellationToken,
    task: Task,
}

struct SchedulerState {
    ledger: ResourceLedger,
    store: TaskStore,
    /// Ids of tasks stored as `Waiting`; the decision loop only decodes these.
    waiting: HashSet<TaskId>,
    /// Actions bound to waiting tasks.
    actions: HashMap<TaskId, Arc<dyn Action>>,
    running: HashMap<TaskId, RunHandle>,
}

struct Shared<S> {
    state: RwLock<SchedulerState>,
    wake: Notify,
    events: EventBus,
    registry: ActionRegistry,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: Mutex<Option<mpsc::UnboundedReceiver<Completion>>>,
    started: AtomicBool,
    shutdown: CancellationToken,
    stopped: CancellationToken,
    spawner: S,
    min_rearm: Duration,
}

/// Single-node batch scheduler. Cheap to clone; clones share one coordinator.
pub struct Scheduler<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> Scheduler<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a scheduler over `store` and recover persisted state.
    ///
    /// Recovery keeps `Waiting` tasks (rebinding their actions through
    /// `registry`) and marks tasks left `Running` by a previous process as
    /// `Error`: their execution is lost and a task never re-enters `Waiting`.
    #[must_use]
    pub fn new(
        ledger: ResourceLedger,
        store: TaskStore,
        registry: ActionRegistry,
        options: SchedulerOptions,
        spawner: S,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let shared = Shared {
            state: RwLock::new(SchedulerState {
                ledger,
                store,
                waiting: HashSet::new(),
                actions: HashMap::new(),
                running: HashMap::new(),
            }),
            wake: Notify::new(),
            events: EventBus::new(options.event_capacity),
            registry,
            completions_tx,
            completions_rx: Mutex::new(Some(completions_rx)),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
            spawner,
            min_rearm: options.min_rearm.max(Duration::from_millis(1)),
        };
        shared.recover();
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Spawn the decision loop. Calling it again is a no-op.
    pub fn start(&self) {
        let Some(rx) = self.shared.completions_rx.lock().take() else {
            warn!("decision loop already started");
            return;
        };
        self.shared.started.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        self.shared.spawner.spawn(run_loop(shared, rx));
    }

    /// Stop launching, cancel every running task, wait until their
    /// completions are recorded, then end the decision loop.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        if self.shared.started.load(Ordering::Acquire) {
            self.shared.stopped.cancelled().await;
        }
    }

    /// Admit a task and return its new id.
    ///
    /// # Errors
    /// - [`SchedulerError::AlreadyAssigned`] if `task.id` is set
    /// - [`SchedulerError::InvalidDemand`] for zero CPU or RAM
    /// - [`SchedulerError::InsufficientCapacity`] above total capacity
    /// - [`SchedulerError::InvalidDeadline`] for a zero max execution time
    /// - [`SchedulerError::UnknownAction`] if no action is bound and the job
    ///   kind is not registered
    /// - store failures; nothing is admitted in that case
    pub fn add(&self, mut task: Task) -> Result<TaskId, SchedulerError> {
        if let Some(id) = task.id {
            return Err(SchedulerError::AlreadyAssigned(id));
        }
        if task.cpu == 0 {
            return Err(SchedulerError::InvalidDemand("cpu must be > 0".into()));
        }
        if task.ram == 0 {
            return Err(SchedulerError::InvalidDemand("ram must be > 0".into()));
        }
        self.shared.state.read().ledger.check(task.cpu, task.ram)?;
        if task.max_execution_time.is_zero() {
            return Err(SchedulerError::InvalidDeadline);
        }
        let action = match task.action.take() {
            Some(action) => Some(action),
            None => task
                .job
                .as_ref()
                .map(|job| self.shared.registry.build(job))
                .transpose()?,
        };

        let id = TaskId::new_v4();
        task.id = Some(id);
        task.status = TaskStatus::Waiting;
        task.mtime = now();
        {
            let mut state = self.shared.state.write();
            state.store.put(&task)?;
            state.waiting.insert(id);
            if let Some(action) = action {
                state.actions.insert(id, action);
            }
            self.shared
                .events
                .publish(LifecycleEvent::from_task(id, &task));
        }
        info!(
            task = %id,
            owner = %task.owner,
            cpu = task.cpu,
            ram = task.ram,
            start = %task.start,
            "task admitted"
        );
        self.shared.wake.notify_one();
        Ok(id)
    }

    /// Cancel a task. Waiting tasks become `Canceled` at once; running tasks
    /// have their context cancelled and become `Canceled` when the action
    /// returns. Terminal tasks are left alone.
    ///
    /// # Errors
    /// [`SchedulerError::NotFound`] for an unknown id, or a store failure.
    pub fn cancel(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut state = self.shared.state.write();
        let mut task = state.store.get(id)?.ok_or(SchedulerError::NotFound(id))?;
        if let Some(handle) = state.running.get(&id) {
            info!(task = %id, "cancelling running task");
            handle.token.cancel();
            return Ok(());
        }
        match task.status {
            TaskStatus::Waiting => {
                task.transition(TaskStatus::Canceled)?;
                state.store.put(&task)?;
                state.waiting.remove(&id);
                state.actions.remove(&id);
                self.shared
                    .events
                    .publish(LifecycleEvent::from_task(id, &task));
                info!(task = %id, "waiting task canceled");
            }
            status => debug!(task = %id, %status, "cancel ignored"),
        }
        Ok(())
    }

    /// Remove terminal tasks whose last change is at least `age` old.
    /// Waiting and running tasks are never removed.
    ///
    /// # Errors
    /// Store failure.
    pub fn flush(&self, age: Duration) -> Result<usize, SchedulerError> {
        let cutoff = older_than(age, now());
        let mut state = self.shared.state.write();
        let removed = state
            .store
            .delete_with_clause(|task| task.status.is_terminal() && task.mtime <= cutoff)?;
        info!(removed, ?age, "flushed terminal tasks");
        Ok(removed)
    }

    /// Snapshot of every task.
    ///
    /// # Errors
    /// [`SchedulerError::SerializationFailure`] for a corrupt record.
    pub fn list(&self) -> Result<Vec<Task>, SchedulerError> {
        self.collect(|_| true)
    }

    /// Tasks belonging to `owner`.
    ///
    /// # Errors
    /// [`SchedulerError::SerializationFailure`] for a corrupt record.
    pub fn filter(&self, owner: &str) -> Result<Vec<Task>, SchedulerError> {
        self.collect(|task| task.owner == owner)
    }

    /// One task.
    ///
    /// # Errors
    /// [`SchedulerError::NotFound`] for an unknown id.
    pub fn get(&self, id: TaskId) -> Result<Task, SchedulerError> {
        self.shared
            .state
            .read()
            .store
            .get(id)?
            .ok_or(SchedulerError::NotFound(id))
    }

    /// Number of tasks in the store.
    #[must_use]
    pub fn length(&self) -> usize {
        self.shared.state.read().store.len()
    }

    /// Ledger counters.
    #[must_use]
    pub fn resources(&self) -> LedgerSnapshot {
        self.shared.state.read().ledger.snapshot()
    }

    /// Receiver for lifecycle events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.shared.events.subscribe()
    }

    /// Wait until the task reaches a terminal status and return it.
    ///
    /// # Errors
    /// [`SchedulerError::NotFound`] for an unknown id.
    pub async fn wait_terminal(&self, id: TaskId) -> Result<TaskStatus, SchedulerError> {
        let mut rx = self.subscribe();
        loop {
            let status = self.get(id)?.status;
            if status.is_terminal() {
                return Ok(status);
            }
            loop {
                match rx.recv().await {
                    Ok(event) if event.task_id == id && event.status.is_terminal() => {
                        return Ok(event.status);
                    }
                    Ok(_) => {}
                    // Missed events; re-read the store.
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => {
                        return self.get(id).map(|task| task.status);
                    }
                }
            }
        }
    }

    fn collect<F>(&self, mut keep: F) -> Result<Vec<Task>, SchedulerError>
    where
        F: FnMut(&Task) -> bool,
    {
        let state = self.shared.state.read();
        let mut tasks = Vec::with_capacity(state.store.len());
        state.store.for_each(|task| {
            if keep(&task) {
                tasks.push(task);
            }
            Ok(())
        })?;
        Ok(tasks)
    }
}

impl<S> Shared<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    fn recover(&self) {
        let mut state = self.state.write();
        let mut waiting = 0usize;
        for mut task in state.store.load_all() {
            let Some(id) = task.id else { continue };
            match task.status {
                TaskStatus::Running => {
                    warn!(task = %id, "task was running when the previous process stopped");
                    self.record(&mut state.store, id, &mut task, TaskStatus::Error);
                }
                TaskStatus::Waiting => {
                    waiting += 1;
                    state.waiting.insert(id);
                    let Some(job) = task.job.as_ref() else { continue };
                    match self.registry.build(job) {
                        Ok(action) => {
                            state.actions.insert(id, action);
                        }
                        Err(e) => warn!(task = %id, error = %e, "cannot rebuild action"),
                    }
                }
                _ => {}
            }
        }
        if waiting > 0 {
            info!(waiting, "recovered waiting tasks");
        }
    }

    /// Apply a transition, persist it and publish it. A failed write is
    /// logged: the transition already happened in the coordinator.
    fn record(&self, store: &mut TaskStore, id: TaskId, task: &mut Task, next: TaskStatus) {
        if let Err(e) = task.transition(next) {
            error!(task = %id, error = %e, "rejected transition");
            return;
        }
        if let Err(e) = store.put(task) {
            error!(task = %id, status = %next, error = %e, "failed to persist transition");
        }
        self.events.publish(LifecycleEvent::from_task(id, task));
    }

    /// One select-reserve-launch pass. Returns the delay until the earliest
    /// future start time, if any task is waiting for one.
    fn step(&self) -> Option<Duration> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let at = now();
        let mut waiting = Vec::with_capacity(state.waiting.len());
        let mut stale = Vec::new();
        for &id in &state.waiting {
            match state.store.get(id) {
                Ok(Some(task)) if task.status == TaskStatus::Waiting => waiting.push(task),
                Ok(_) => stale.push(id),
                Err(e) => warn!(task = %id, error = %e, "cannot load waiting task"),
            }
        }
        for id in stale {
            state.waiting.remove(&id);
        }

        loop {
            let best = waiting
                .iter()
                .enumerate()
                .filter(|(_, task)| task.is_startable(at) && state.ledger.fits(task.cpu, task.ram))
                .min_by(|(_, a), (_, b)| karma_cmp(a, b))
                .map(|(idx, _)| idx);
            let Some(idx) = best else { break };
            let task = waiting.swap_remove(idx);
            self.launch(state, task);
        }

        let soonest = waiting
            .iter()
            .filter(|task| !task.is_startable(at))
            .min_by(|a, b| start_cmp(a, b))?
            .start;
        let delay = until(soonest, now()).unwrap_or_default().max(self.min_rearm);
        debug!(waiting = waiting.len(), ?delay, "armed start timer");
        Some(delay)
    }

    fn launch(&self, state: &mut SchedulerState, mut task: Task) {
        let Some(id) = task.id else { return };
        state.waiting.remove(&id);
        let action = state.actions.remove(&id).or_else(|| {
            let job = task.job.as_ref()?;
            self.registry
                .build(job)
                .map_err(|e| warn!(task = %id, error = %e, "cannot rebuild action"))
                .ok()
        });
        let Some(action) = action else {
            warn!(task = %id, "no action bound to task");
            self.record(&mut state.store, id, &mut task, TaskStatus::Error);
            return;
        };

        state.ledger.consume(task.cpu, task.ram);
        self.record(&mut state.store, id, &mut task, TaskStatus::Running);

        let token = CancellationToken::new();
        let deadline = Instant::now() + task.max_execution_time;
        let ctx = ExecutionContext::new(id, deadline, &token);
        info!(
            task = %id,
            action = action.name(),
            cpu = task.cpu,
            ram = task.ram,
            karma = task.karma(),
            available_cpu = state.ledger.snapshot().available_cpu,
            available_ram = state.ledger.snapshot().available_ram,
            "task launched"
        );
        state.running.insert(
            id,
            RunHandle {
                token: token.clone(),
                task,
            },
        );

        let tx = self.completions_tx.clone();
        self.spawner.spawn(async move {
            let outcome = execute(action, ctx, token).await;
            let _ = tx.send(Completion { id, outcome });
        });
    }

    fn complete(&self, completion: Completion) {
        let Completion { id, outcome } = completion;
        let mut guard = self.state.write();
        let state = &mut *guard;
        let Some(RunHandle { mut task, .. }) = state.running.remove(&id) else {
            warn!(task = %id, "completion for a task that is not running");
            return;
        };
        state.ledger.release(task.cpu, task.ram);

        let status = outcome.status();
        match &outcome {
            Outcome::Failure(reason) => warn!(task = %id, %reason, "task failed"),
            _ => info!(task = %id, %status, "task finished"),
        }
        self.record(&mut state.store, id, &mut task, status);
    }

    /// Cancel every running task; returns how many are still running.
    fn cancel_running(&self) -> usize {
        let state = self.state.read();
        for handle in state.running.values() {
            handle.token.cancel();
        }
        state.running.len()
    }
}

/// Run the action until it returns. At the deadline the context is
/// cancelled and the action is awaited further.
async fn execute(action: Arc<dyn Action>, ctx: ExecutionContext, token: CancellationToken) -> Outcome {
    let deadline = ctx.deadline();
    let task_id = ctx.task_id();
    let mut run = AssertUnwindSafe(action.run(ctx)).catch_unwind();
    let result = tokio::select! {
        result = &mut run => result,
        () = tokio::time::sleep_until(deadline) => {
            debug!(task = %task_id, "deadline reached");
            token.cancel();
            run.await
        }
    };
    match result {
        Err(_) => Outcome::Failure("action panicked".into()),
        Ok(_) if token.is_cancelled() => Outcome::Canceled,
        Ok(Ok(())) => Outcome::Success,
        Ok(Err(e)) => Outcome::Failure(format!("{e:#}")),
    }
}

async fn run_loop<S>(shared: Arc<Shared<S>>, mut completions: mpsc::UnboundedReceiver<Completion>)
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    info!("decision loop started");
    loop {
        while let Ok(completion) = completions.try_recv() {
            shared.complete(completion);
        }

        if shared.shutdown.is_cancelled() {
            let running = shared.cancel_running();
            if running == 0 {
                break;
            }
            debug!(running, "draining running tasks");
            match completions.recv().await {
                Some(completion) => shared.complete(completion),
                None => break,
            }
            continue;
        }

        let timer = shared.step();
        let sleep = async {
            match timer {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            () = shared.wake.notified() => {}
            Some(completion) = completions.recv() => shared.complete(completion),
            () = sleep => {}
            () = shared.shutdown.cancelled() => {}
        }
    }
    info!("decision loop stopped");
    shared.stopped.cancel();
}

//! Lifecycle events and the broadcast bus that carries them.
//!
//! Publishing never blocks. Subscribers only see events sent after they
//! subscribed; a receiver that falls more than `capacity` events behind
//! observes `RecvError::Lagged` and skips the oldest ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::{Task, TaskStatus};
use crate::util::clock::now;
use crate::util::ids::TaskId;

/// One status transition of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Task that changed.
    pub task_id: TaskId,
    /// Owner of the task.
    pub owner: String,
    /// New status.
    pub status: TaskStatus,
    /// Time of the transition.
    pub at: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Build an event from a task whose status was just updated.
    #[must_use]
    pub fn from_task(task_id: TaskId, task: &Task) -> Self {
        Self {
            task_id,
            owner: task.owner.clone(),
            status: task.status,
            at: now(),
        }
    }
}

/// Fan-out channel for lifecycle events.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a bus retaining at most `capacity` undelivered events (min 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to all current subscribers; dropped if there are none.
    pub fn publish(&self, event: LifecycleEvent) {
        tracing::trace!(task = %event.task_id, status = %event.status, "publish");
        let _ = self.tx.send(event);
    }

    /// New independent receiver for subsequent events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

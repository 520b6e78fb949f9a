//! Tests for error types

use batch_scheduler::core::{SchedulerError, TaskStatus};
use batch_scheduler::util::ids::TaskId;

#[test]
fn test_invalid_demand_error() {
    let err = SchedulerError::InvalidDemand("cpu must be > 0".to_string());
    assert_eq!(format!("{err}"), "invalid demand: cpu must be > 0");
}

#[test]
fn test_insufficient_capacity_error() {
    let err = SchedulerError::InsufficientCapacity {
        resource: "ram",
        requested: 4096,
        total: 1024,
    };
    assert_eq!(
        format!("{err}"),
        "insufficient capacity: ram requested 4096, total 1024"
    );
}

#[test]
fn test_invalid_deadline_error() {
    let err = SchedulerError::InvalidDeadline;
    assert!(format!("{err}").starts_with("invalid deadline"));
}

#[test]
fn test_not_found_error_names_the_id() {
    let id = TaskId::new_v4();
    let err = SchedulerError::NotFound(id);
    assert_eq!(format!("{err}"), format!("task not found: {id}"));
}

#[test]
fn test_invalid_transition_error() {
    let id = TaskId::new_v4();
    let err = SchedulerError::InvalidTransition {
        id,
        from: TaskStatus::Done,
        to: TaskStatus::Running,
    };
    assert_eq!(
        format!("{err}"),
        format!("invalid transition for task {id}: Done -> Running")
    );
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::BackendUnavailable("disk full".to_string());
    assert_eq!(format!("{err}"), "backend unavailable: disk full");
}

#[test]
fn test_errors_convert_into_anyhow() {
    fn fails() -> batch_scheduler::core::AppResult<()> {
        Err(SchedulerError::UnknownAction("teleport".to_string()))?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
    assert_eq!(err.to_string(), "unknown action kind: teleport");
}

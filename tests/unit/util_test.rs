//! Tests for utility functions

use batch_scheduler::util::clock::{now, older_than, until};
use batch_scheduler::util::ids::TaskId;
use std::str::FromStr;
use std::time::Duration;

#[test]
fn test_task_id_round_trips_through_text() {
    let id = TaskId::new_v4();
    let parsed = TaskId::from_str(&id.to_string()).unwrap();
    assert_eq!(parsed, id);
    assert!(TaskId::from_str("not-a-uuid").is_err());
}

#[test]
fn test_until_only_for_future_instants() {
    let at = now();
    assert_eq!(until(at, at), None);
    let later = at + chrono::Duration::milliseconds(250);
    assert_eq!(until(later, at), Some(Duration::from_millis(250)));
}

#[test]
fn test_older_than_saturates() {
    let at = now();
    assert_eq!(older_than(Duration::ZERO, at), at);
    assert!(older_than(Duration::MAX, at) < at);
}

#[test]
fn test_init_tracing_is_idempotent() {
    batch_scheduler::util::telemetry::init_tracing();
    batch_scheduler::util::telemetry::init_tracing();
}

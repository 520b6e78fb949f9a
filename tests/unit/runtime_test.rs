//! Tests for the tokio spawner and API helpers

use batch_scheduler::builders::build_scheduler;
use batch_scheduler::config::SchedulerConfig;
use batch_scheduler::core::{JobSpec, SchedulerError, Spawn, TaskStatus};
use batch_scheduler::runtime::tokio_spawner::TokioSpawner;
use batch_scheduler::runtime::{cancel_task, default_registry, health, list_tasks, submit_task, TaskSubmission};
use serde_json::json;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

fn submission(owner: &str, ms: u64) -> TaskSubmission {
    serde_json::from_value(json!({
        "owner": owner,
        "cpu": 1,
        "ram": 128,
        "max_execution_time_ms": 5000,
        "job": { "kind": "sleep", "params": { "ms": ms } }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_submit_list_and_cancel() {
    let cfg = SchedulerConfig::from_json_str(r#"{"cpu": 1, "ram": 1024}"#).unwrap();
    let scheduler = build_scheduler(&cfg, default_registry(), TokioSpawner::current()).unwrap();

    // Loop not started yet: both stay waiting.
    let first = submit_task(&scheduler, submission("alice", 10)).unwrap();
    let second = submit_task(&scheduler, submission("bob", 10)).unwrap();
    assert_eq!(first.status, TaskStatus::Waiting);
    assert_eq!(first.kind.as_deref(), Some("sleep"));
    assert_eq!(first.max_execution_time_ms, 5000);

    assert_eq!(list_tasks(&scheduler, None).unwrap().len(), 2);
    assert_eq!(list_tasks(&scheduler, Some("bob")).unwrap()[0].id, second.id);

    let canceled = cancel_task(&scheduler, second.id).unwrap();
    assert_eq!(canceled.status, TaskStatus::Canceled);

    scheduler.start();
    let status = tokio::time::timeout(Duration::from_secs(5), scheduler.wait_terminal(first.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, TaskStatus::Done);

    let report = health(&scheduler);
    assert!(report.ok);
    assert_eq!(report.tasks, 2);
    assert_eq!(report.resources.used_cpu(), 0);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_submit_unknown_kind() {
    let cfg = SchedulerConfig::from_json_str(r#"{"cpu": 1, "ram": 1024}"#).unwrap();
    let scheduler = build_scheduler(&cfg, default_registry(), TokioSpawner::current()).unwrap();
    let mut req = submission("alice", 1);
    req.job = JobSpec::new("teleport", json!({}));
    assert!(matches!(
        submit_task(&scheduler, req),
        Err(SchedulerError::UnknownAction(_))
    ));
}

#[test]
fn test_submission_start_defaults_to_now() {
    let before = chrono::Utc::now();
    let task = submission("alice", 1).into_task();
    assert!(task.start >= before);
    assert!(task.id.is_none());
    assert_eq!(task.max_execution_time, Duration::from_secs(5));
}

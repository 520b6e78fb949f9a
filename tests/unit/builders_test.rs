//! Tests for building schedulers from configuration

use batch_scheduler::builders::{build_scheduler, build_store};
use batch_scheduler::config::{SchedulerConfig, StoreBackendConfig};
use batch_scheduler::core::{SchedulerError, Task};
use batch_scheduler::runtime::{default_registry, TokioSpawner};
use std::time::Duration;

#[tokio::test]
async fn test_build_scheduler_in_memory() {
    let cfg = SchedulerConfig::from_json_str(r#"{"cpu": 2, "ram": 2048}"#).unwrap();
    let scheduler = build_scheduler(&cfg, default_registry(), TokioSpawner::current()).unwrap();
    let snapshot = scheduler.resources();
    assert_eq!(snapshot.total_cpu, 2);
    assert_eq!(snapshot.available_ram, 2048);
    assert_eq!(scheduler.length(), 0);
}

#[tokio::test]
async fn test_build_scheduler_rejects_invalid_config() {
    let cfg = SchedulerConfig {
        cpu: 0,
        ..SchedulerConfig::default()
    };
    let err = build_scheduler(&cfg, default_registry(), TokioSpawner::current())
        .err()
        .unwrap();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_build_file_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = StoreBackendConfig::File {
        path: dir.path().join("state").join("tasks.jsonl"),
    };
    let mut task = Task::new("alice", 1, 64, Duration::from_secs(1));
    task.id = Some(batch_scheduler::util::ids::TaskId::new_v4());
    {
        let mut store = build_store(&cfg).unwrap();
        store.put(&task).unwrap();
    }
    let store = build_store(&cfg).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(task.id.unwrap()).unwrap().unwrap().owner, "alice");
}

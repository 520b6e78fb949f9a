//! Tests for configuration validation

use batch_scheduler::config::{SchedulerConfig, StoreBackendConfig};
use batch_scheduler::core::SchedulerError;
use std::path::PathBuf;

fn valid() -> SchedulerConfig {
    SchedulerConfig {
        cpu: 4,
        ram: 16384,
        store: StoreBackendConfig::InMemory,
        event_capacity: 128,
        min_rearm_ms: 50,
    }
}

#[test]
fn test_scheduler_config_validation() {
    assert!(valid().validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_cpu() {
    let invalid = SchedulerConfig { cpu: 0, ..valid() };
    assert!(matches!(invalid.validate(), Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_scheduler_config_invalid_ram() {
    let invalid = SchedulerConfig { ram: 0, ..valid() };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_event_capacity() {
    let invalid = SchedulerConfig {
        event_capacity: 0,
        ..valid()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_empty_store_path() {
    let invalid = SchedulerConfig {
        store: StoreBackendConfig::File {
            path: PathBuf::new(),
        },
        ..valid()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "cpu": 8,
        "ram": 32768,
        "store": { "kind": "file", "path": "/var/lib/batch/tasks.jsonl" },
        "min_rearm_ms": 20
    }"#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.cpu, 8);
    assert_eq!(cfg.event_capacity, 1024);
    assert_eq!(cfg.min_rearm_ms, 20);
    assert!(matches!(cfg.store, StoreBackendConfig::File { .. }));
}

#[test]
fn test_scheduler_config_from_json_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"cpu": 0, "ram": 1}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
    assert!(SchedulerConfig::from_json_str(r#"{"cpu": 1, "ram": 1, "store": {"kind": "postgres"}}"#).is_err());
}

#[test]
fn test_scheduler_config_default_uses_host_cpus() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.cpu >= 1);
    assert!(cfg.validate().is_ok());
}

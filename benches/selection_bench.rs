//! Benchmarks for the scheduler.
//!
//! Benchmarks cover:
//! - Karma selection over a waiting set
//! - Task store writes and scans (memory and file backends)
//! - End-to-end admission through completion

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use batch_scheduler::core::{
    karma_cmp, ResourceLedger, Scheduler, SchedulerOptions, Task, TaskStore,
};
use batch_scheduler::infra::{FileBackend, InMemoryBackend};
use batch_scheduler::runtime::{default_registry, SleepAction, TokioSpawner};
use batch_scheduler::util::ids::TaskId;
use rand::Rng;
use tokio::runtime::Runtime;

// ============================================================================
// Fixtures
// ============================================================================

fn waiting_set(n: usize) -> Vec<Task> {
    let mut rng = rand::rng();
    (0..n)
        .map(|_| {
            let mut task = Task::new(
                "bench",
                rng.random_range(1..=16),
                rng.random_range(64..=65536),
                Duration::from_millis(rng.random_range(100..=600_000)),
            );
            task.id = Some(TaskId::new_v4());
            task
        })
        .collect()
}

// ============================================================================
// Selection
// ============================================================================

fn bench_karma_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("karma_selection");
    for size in [16usize, 256, 4096] {
        let tasks = waiting_set(size);
        let ledger = ResourceLedger::new(8, 32768);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tasks, |b, tasks| {
            b.iter(|| {
                tasks
                    .iter()
                    .filter(|t| ledger.fits(t.cpu, t.ram))
                    .min_by(|a, b| karma_cmp(a, b))
                    .map(|t| black_box(t.id))
            });
        });
    }
    group.finish();
}

// ============================================================================
// Store
// ============================================================================

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_store");
    let tasks = waiting_set(512);
    group.throughput(Throughput::Elements(tasks.len() as u64));

    group.bench_function("memory_put_scan", |b| {
        b.iter(|| {
            let mut store = TaskStore::new(Box::new(InMemoryBackend::new()));
            for task in &tasks {
                store.put(task).unwrap();
            }
            black_box(store.load_all().len())
        });
    });

    group.sample_size(10);
    group.bench_function("file_put_scan", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            let backend = FileBackend::open(dir.path().join("tasks.jsonl")).unwrap();
            let mut store = TaskStore::new(Box::new(backend));
            for task in tasks.iter().take(64) {
                store.put(task).unwrap();
            }
            black_box(store.load_all().len())
        });
    });
    group.finish();
}

// ============================================================================
// End-to-end
// ============================================================================

fn bench_end_to_end(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("end_to_end");
    group.sample_size(20);
    group.bench_function("admit_run_64", |b| {
        b.to_async(&rt).iter(|| async {
            let scheduler = Scheduler::new(
                ResourceLedger::new(8, 32768),
                TaskStore::new(Box::new(InMemoryBackend::new())),
                default_registry(),
                SchedulerOptions::default(),
                TokioSpawner::current(),
            );
            scheduler.start();
            let ids: Vec<TaskId> = (0..64)
                .map(|i| {
                    let task = Task::new("bench", 1 + i % 4, 256, Duration::from_secs(5))
                        .with_action(Arc::new(SleepAction::new(Duration::ZERO)));
                    scheduler.add(task).unwrap()
                })
                .collect();
            for id in ids {
                black_box(scheduler.wait_terminal(id).await.unwrap());
            }
            scheduler.shutdown().await;
        });
    });
    group.finish();
}

criterion_group!(benches, bench_karma_selection, bench_store, bench_end_to_end);
criterion_main!(benches);

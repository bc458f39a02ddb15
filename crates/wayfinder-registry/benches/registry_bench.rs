// Benchmarks for the in-memory registry backend
// Measures registration, name lookup, tag intersection and sweeping

use std::hint::black_box;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Duration, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use wayfinder_registry::{HealthState, HealthStatus, MemoryStorage, ServiceInstance, Storage};

fn create_test_instance(index: u32, name: &str) -> ServiceInstance {
    let tags = match index % 4 {
        0 => vec!["primary", "eu"],
        1 => vec!["primary", "us"],
        2 => vec!["canary", "eu"],
        _ => vec!["canary", "us"],
    };
    ServiceInstance::new(
        format!("{}-{}", name, index),
        name,
        "192.168.1.1",
        (8000 + index % 50000) as u16,
    )
    .with_tags(tags)
}

fn populated(rt: &Runtime, count: u32) -> MemoryStorage {
    let storage = MemoryStorage::new();
    rt.block_on(async {
        for i in 0..count {
            let mut instance = create_test_instance(i, "bench-service");
            if i % 2 == 1 {
                instance.health = HealthStatus::new(HealthState::Critical, "down");
            }
            storage.register(instance).await.unwrap();
        }
    });
    storage
}

fn bench_register(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let storage = MemoryStorage::new();
    let counter = AtomicU32::new(0);

    c.bench_function("register_instance", |b| {
        b.to_async(&rt).iter(|| async {
            let i = counter.fetch_add(1, Ordering::Relaxed);
            storage
                .register(black_box(create_test_instance(i, "bench-service")))
                .await
        })
    });
}

fn bench_list_by_name(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("list_by_name");

    for size in [10u32, 100, 1000] {
        let storage = populated(&rt, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.to_async(&rt)
                .iter(|| async { storage.list_by_name(black_box("bench-service")).await })
        });
    }
    group.finish();
}

fn bench_get_healthy(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let storage = populated(&rt, 1000);

    c.bench_function("get_healthy_1000", |b| {
        b.to_async(&rt)
            .iter(|| async { storage.get_healthy(black_box("bench-service")).await })
    });
}

fn bench_tag_intersection(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let storage = populated(&rt, 1000);
    let tags = vec!["primary".to_string(), "eu".to_string()];

    c.bench_function("list_by_tags_1000", |b| {
        b.to_async(&rt).iter(|| async {
            storage
                .list_by_name_and_tags(black_box(""), black_box(&tags))
                .await
        })
    });
}

fn bench_sweep(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let storage = MemoryStorage::new();
    rt.block_on(async {
        for i in 0..1000 {
            let instance = create_test_instance(i, "bench-service").with_ttl(3600);
            storage.register(instance).await.unwrap();
        }
    });

    // Nothing is due, so every iteration scans the full population
    let now = Utc::now() + Duration::seconds(60);
    c.bench_function("sweep_expired_1000_live", |b| {
        b.iter(|| storage.sweep_expired_at(black_box(now)))
    });
}

criterion_group!(
    benches,
    bench_register,
    bench_list_by_name,
    bench_get_healthy,
    bench_tag_intersection,
    bench_sweep,
);
criterion_main!(benches);

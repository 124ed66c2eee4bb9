use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use tagrepo::cache::{CacheConfig, CacheOptions, CacheService, InMemoryBackend};
use tokio::runtime::Runtime;

fn service() -> CacheService {
    let backend = Arc::new(InMemoryBackend::new(CacheConfig::deterministic()));
    CacheService::new(backend, CacheConfig::deterministic())
}

/// Benchmark: tagged set followed by get
fn bench_set_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = service();
    let options = CacheOptions::tagged(["users", "users_list"]);

    c.bench_function("tagged_set_get", |b| {
        b.to_async(&rt).iter(|| async {
            cache.set(black_box("user:id:1"), &"payload", &options).await;
            black_box(cache.get::<String>("user:id:1").await);
        });
    });
}

/// Benchmark: invalidating one tag covering N keys
fn bench_invalidate_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidate_fan_out");
    let rt = Runtime::new().unwrap();
    let tags = vec!["users".to_string()];

    for size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let cache = service();
            let options = CacheOptions::tagged(["users"]);

            b.to_async(&rt).iter(|| {
                let cache = cache.clone();
                let options = options.clone();
                let tags = tags.clone();
                async move {
                    for i in 0..size {
                        cache.set(&format!("user:id:{}", i), &i, &options).await;
                    }
                    black_box(cache.invalidate_tags(&tags).await);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_set_get, bench_invalidate_fan_out);
criterion_main!(benches);

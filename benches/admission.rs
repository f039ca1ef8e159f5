//! # Admission Benchmarks
//!
//! Hot-path costs of the admission check.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tollbooth::{client_identity, AdmissionConfig, LimiterRegistry, RegistryConfig, TokenBucket};

/// Benchmark a single bucket's refill-and-consume
fn bench_bucket_consume(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_consume");
    group.throughput(Throughput::Elements(1));

    group.bench_function("admitted", |b| {
        let bucket = TokenBucket::new(AdmissionConfig::new(u64::MAX, 1), Instant::now()).unwrap();
        b.iter(|| std::hint::black_box(bucket.try_consume(Instant::now())));
    });

    group.bench_function("rejected", |b| {
        let start = Instant::now();
        let bucket = TokenBucket::new(AdmissionConfig::new(1, 1), start).unwrap();
        bucket.try_consume(start);
        b.iter(|| std::hint::black_box(bucket.try_consume(start)));
    });

    group.bench_function("with_stale_gap", |b| {
        let config =
            AdmissionConfig::new(u64::MAX, 1000).with_stale_gap(Duration::from_millis(10));
        let bucket = TokenBucket::new(config, Instant::now()).unwrap();
        b.iter(|| std::hint::black_box(bucket.try_consume(Instant::now())));
    });

    group.finish();
}

/// Benchmark registry checks against an already known identity
fn bench_registry_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_check");
    group.throughput(Throughput::Elements(1));

    for population in [1usize, 1_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(population),
            &population,
            |b, &population| {
                let registry = LimiterRegistry::new();
                let config = AdmissionConfig::new(u64::MAX, 1);
                let now = Instant::now();
                for i in 0..population {
                    registry.check(&format!("client-{}", i), &config, now).unwrap();
                }
                b.iter(|| std::hint::black_box(registry.check("client-0", &config, now)));
            },
        );
    }

    group.finish();
}

/// Benchmark first sight of an identity (bucket creation)
fn bench_registry_create(c: &mut Criterion) {
    let config = AdmissionConfig::default();

    c.bench_function("registry_create", |b| {
        b.iter_batched(
            LimiterRegistry::new,
            |registry| {
                for i in 0..100 {
                    registry.check_now(&format!("10.0.0.{}", i), &config).unwrap();
                }
                registry
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark concurrent checks across threads
fn bench_concurrent_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_check");

    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::new("same_client", threads),
            &threads,
            |b, &threads| {
                let registry = Arc::new(LimiterRegistry::new());
                let config = AdmissionConfig::new(u64::MAX, 1);
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let registry = Arc::clone(&registry);
                            let config = config.clone();
                            thread::spawn(move || {
                                for _ in 0..1000 {
                                    std::hint::black_box(registry.check_now("hot", &config))
                                        .unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("distinct_clients", threads),
            &threads,
            |b, &threads| {
                let registry = Arc::new(LimiterRegistry::new());
                let config = AdmissionConfig::new(u64::MAX, 1);
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|t| {
                            let registry = Arc::clone(&registry);
                            let config = config.clone();
                            let identity = format!("client-{}", t);
                            thread::spawn(move || {
                                for _ in 0..1000 {
                                    std::hint::black_box(registry.check_now(&identity, &config))
                                        .unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the eviction sweep over a mostly idle population
fn bench_evict_idle(c: &mut Criterion) {
    let mut group = c.benchmark_group("evict_idle");

    for population in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(population as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(population),
            &population,
            |b, &population| {
                let config = AdmissionConfig::new(10, 10);
                b.iter_batched(
                    || {
                        let registry = LimiterRegistry::with_config(
                            RegistryConfig::default().with_min_idle(Duration::from_millis(1)),
                        )
                        .unwrap();
                        let start = Instant::now();
                        for i in 0..population {
                            registry.check(&format!("c{}", i), &config, start).unwrap();
                        }
                        (registry, start + Duration::from_secs(60))
                    },
                    |(registry, later)| registry.evict_idle(later),
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark peer address parsing
fn bench_client_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("client_identity");

    for peer in ["192.168.10.20:51234", "[2001:db8::1]:443", "gateway.internal:9000"] {
        group.bench_with_input(BenchmarkId::from_parameter(peer), &peer, |b, peer| {
            b.iter(|| std::hint::black_box(client_identity(peer)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_bucket_consume,
    bench_registry_check,
    bench_registry_create,
    bench_concurrent_check,
    bench_evict_idle,
    bench_client_identity
);

criterion_main!(benches);

//! HOT PATH PERFORMANCE BENCHMARKS
//!
//! Recording calls sit inside application request paths and must stay
//! at the cost of a few atomic operations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metron::core::{Config, ConfigBuilder};
use metron::metrics::{Counter, MetricName, TimedRecorder, ValueMetric};
use metron::MetricRegistry;
use std::sync::Arc;
use std::thread;

/// Counter and value recording
/// TARGET: <10ns per call
fn bench_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("recording");
    let registry = MetricRegistry::new(&Config::default()).unwrap();

    let counter = registry.counter("bench.web.requests").unwrap();
    group.bench_function("counter_increment", |b| {
        b.iter(|| counter.increment());
    });

    let value = registry.value_metric("bench.web.bytes").unwrap();
    group.bench_function("value_add", |b| {
        let mut n = 0i64;
        b.iter(|| {
            n = (n + 7) & 0xffff;
            value.add(black_box(n));
        });
    });

    let timed = registry.timed_metric("bench.db.query").unwrap();
    group.bench_function("timed_add_event", |b| {
        b.iter(|| timed.add_event_duration(true, black_box(1_500)));
    });

    group.bench_function("timed_start_end", |b| {
        b.iter(|| timed.start_event().end_with_success());
    });

    group.finish();
}

/// Bucket routing by duration
/// TARGET: <20ns for up to 16 bounds
fn bench_bucket_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_routing");
    let registry = MetricRegistry::new(&Config::default()).unwrap();

    for size in [4usize, 16] {
        let bounds: Vec<i64> = (1..=size as i64).map(|i| i * 10).collect();
        let metric = registry
            .bucket_timed_metric(MetricName::new("bench", "latency", format!("b{}", size)), &bounds)
            .unwrap();

        group.bench_with_input(BenchmarkId::new("add_event", size), &size, |b, _| {
            let mut nanos = 0i64;
            b.iter(|| {
                nanos = (nanos + 3_333_333) % 200_000_000;
                metric.add_event_duration(true, black_box(nanos));
            });
        });
    }

    group.finish();
}

/// Registry lookups of already-created metrics
/// TARGET: <50ns per lookup
fn bench_registry_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_lookup");
    let registry = MetricRegistry::new(&Config::default()).unwrap();
    let names: Vec<MetricName> = (0..100)
        .map(|i| MetricName::new("bench", "svc", format!("op{}", i)))
        .collect();
    for name in &names {
        registry.counter(name.clone()).unwrap();
    }

    group.bench_function("existing_counter", |b| {
        let name = &names[42];
        b.iter(|| black_box(registry.counter(name.clone()).unwrap()));
    });

    group.bench_function("disabled_counter", |b| {
        let disabled =
            MetricRegistry::new(&ConfigBuilder::new().disabled(true).build().unwrap()).unwrap();
        let counter = disabled.counter("bench.web.requests").unwrap();
        b.iter(|| counter.increment());
    });

    group.finish();
}

/// Shared counter under contention
fn bench_contended_counter(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    let registry = Arc::new(MetricRegistry::new(&Config::default()).unwrap());

    for threads in [2usize, 4] {
        group.bench_with_input(BenchmarkId::new("counter_x1000", threads), &threads, |b, &threads| {
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let registry = Arc::clone(&registry);
                        thread::spawn(move || {
                            let counter = registry.counter("bench.web.shared").unwrap();
                            for _ in 0..1000 {
                                counter.increment();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

/// Nested request sections through a capturing context
fn bench_request_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_capture");
    let registry = MetricRegistry::new(&Config::default()).unwrap();
    let handler = MetricName::parse("bench.web.handler");
    let query = registry.timed_metric("bench.db.query").unwrap();

    group.bench_function("three_sections", |b| {
        let ctx = registry.request_context();
        b.iter(|| {
            let _request = ctx.enter(handler.clone());
            ctx.time(query.as_ref()).end_with_success();
            ctx.time(query.as_ref()).end_with_success();
        });
        registry.collect_request_timings();
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_recording,
    bench_bucket_routing,
    bench_registry_lookup,
    bench_contended_counter,
    bench_request_capture
);
criterion_main!(benches);

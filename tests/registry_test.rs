//! Registry behaviour under concurrency and across collection cycles.

mod common;

use common::test_registry;
use metron::metrics::{Counter, GaugeDoubleMetric, GaugeGroup, MetricName, TimedRecorder, ValueMetric};
use metron::{Metric, MetricKind};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_racing_first_access_creates_one_metric() {
    let (registry, _clock) = test_registry();

    for kind in [MetricKind::Counter, MetricKind::Value, MetricKind::Timed] {
        let name = MetricName::new("race", kind.label(), "metric");
        let barrier = Arc::new(Barrier::new(32));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let name = name.clone();
                let kind = kind.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_or_create(&name, kind).unwrap()
                })
            })
            .collect();

        let seen: Vec<Metric> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(seen.iter().all(|m| m.ptr_eq(&seen[0])));
    }

    assert_eq!(registry.len(), 3);
}

#[test]
fn test_concurrent_recording_through_shared_handles() {
    let (registry, _clock) = test_registry();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    registry.counter("app.web.requests").unwrap().increment();
                    registry.value_metric("app.web.bytes").unwrap().add(10);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.counter("app.web.requests").unwrap().count(), 8_000);
    let bytes = registry.value_metric("app.web.bytes").unwrap();
    assert_eq!(bytes.count(), 8_000);
    assert_eq!(bytes.total(), 80_000);
    assert_eq!(bytes.max(), 10);
}

#[test]
fn test_collect_non_empty_excludes_trivial_metrics() {
    let (registry, _clock) = test_registry();

    registry.counter("app.b.zero").unwrap();
    registry.counter("app.a.net_zero").unwrap().add(0);
    registry.value_metric("app.c.empty").unwrap();
    registry.timed_metric("app.d.idle").unwrap();
    registry
        .bucket_timed_metric("app.e.idle", &[10, 100])
        .unwrap();

    registry.counter("app.z.hits").unwrap().increment();
    registry.value_metric("app.m.size").unwrap().add(5);
    registry
        .bucket_timed_metric("app.k.latency", &[10, 100])
        .unwrap()
        .add_event_duration(true, 50_000_000);

    let names: Vec<String> = registry
        .collect_non_empty_metrics()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, vec!["app.k.latency", "app.m.size", "app.z.hits"]);
}

#[test]
fn test_collection_resets_interval() {
    let (registry, clock) = test_registry();
    let counter = registry.counter("app.web.requests").unwrap();

    counter.add(5);
    clock.set_millis(11_000);
    assert_eq!(registry.collect_non_empty_metrics().len(), 1);
    assert_eq!(counter.count(), 0);

    // nothing new recorded
    assert!(registry.collect_non_empty_metrics().is_empty());

    counter.increment();
    assert_eq!(registry.collect_non_empty_metrics().len(), 1);
}

#[test]
fn test_platform_gauges_collected_separately() {
    let (registry, _clock) = test_registry();

    registry.register_platform(Arc::new(
        GaugeGroup::new(MetricName::base("jvm", "memory.heap"))
            .with_gauge("used", || 128.0)
            .with_gauge("max", || 512.0),
    ));
    registry.register_platform(Arc::new(GaugeDoubleMetric::new(
        MetricName::parse("os.cpu.load"),
        || 0.0,
    )));
    assert!(!registry.register_platform_gauge::<fn() -> f64>("os.cgroup.limit", None));

    assert_eq!(registry.platform_metrics().len(), 2);
    assert!(registry.metrics().is_empty());

    // the zero-valued gauge is not reportable
    let collected = registry.collect_non_empty_platform_metrics();
    let names: Vec<String> = collected.iter().map(|m| m.name().to_string()).collect();
    assert_eq!(names, vec!["jvm.memory.heap"]);
    assert!(registry.collect_non_empty_metrics().is_empty());
}

#[test]
fn test_clear_then_recreate() {
    let (registry, _clock) = test_registry();
    let old = registry.counter("app.web.requests").unwrap();
    old.add(3);

    registry.clear();
    assert!(registry.is_empty());

    let new = registry.counter("app.web.requests").unwrap();
    assert_eq!(new.count(), 0);
    new.increment();
    // the old handle is detached from the registry
    old.add(100);

    let collected = registry.collect_non_empty_metrics();
    assert_eq!(collected.len(), 1);
    assert!(matches!(&collected[0], Metric::Counter(c) if c.count() == 0));
}

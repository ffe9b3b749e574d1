//! Report scheduler end-to-end tests.

mod common;

use common::{test_registry, CollectingReporter, FailingReporter, Reported};
use metron::core::config::ReportingConfig;
use metron::metrics::{Counter, MetricName, TimedRecorder};
use metron::report::{MetricReporter, ReportCycle, ReportScheduler};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn config(interval: Duration, cleanup_interval: Duration) -> ReportingConfig {
    ReportingConfig {
        interval,
        cleanup_interval,
    }
}

#[tokio::test]
async fn test_run_cycle_reports_sorted_snapshot() {
    let (registry, _clock) = test_registry();
    let local = CollectingReporter::new();

    let scheduler = ReportScheduler::start(
        Arc::clone(&registry),
        &config(Duration::from_secs(3600), Duration::from_secs(8 * 3600)),
        Some(Arc::clone(&local) as Arc<dyn MetricReporter>),
        None,
    )
    .unwrap();

    registry.counter("app.web.requests").unwrap().add(2);
    let query = registry.timed_metric("app.db.query").unwrap();
    query.add_event_duration(true, 1_000);
    query.add_event_duration(false, 2_000);
    registry.register_platform_gauge(MetricName::parse("os.cpu.load"), Some(|| 0.25));

    let summary = scheduler.run_cycle();
    assert_eq!(summary.metrics, 3);
    assert_eq!(summary.reporter_failures, 0);

    assert_eq!(
        local.cycles(),
        vec![vec![
            Reported::GaugeDouble("os.cpu.load".to_string(), 0.25),
            Reported::Timed("app.db.query".to_string(), 1, 1),
            Reported::Counter("app.web.requests".to_string(), 2),
        ]]
    );

    // the next cycle has nothing new to say
    scheduler.run_cycle();
    assert!(local.cycles()[1].is_empty());

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_failing_reporter_does_not_block_the_other() {
    let (registry, _clock) = test_registry();
    let failing = Arc::new(FailingReporter::default());
    let remote = CollectingReporter::new();

    let scheduler = ReportScheduler::start(
        Arc::clone(&registry),
        &config(Duration::from_secs(3600), Duration::from_secs(3600)),
        Some(Arc::clone(&failing) as Arc<dyn MetricReporter>),
        Some(Arc::clone(&remote) as Arc<dyn MetricReporter>),
    )
    .unwrap();

    registry.counter("app.web.requests").unwrap().increment();

    // report and cleanup both fail for the local reporter
    let summary = scheduler.run_cycle();
    assert_eq!(summary.reporter_failures, 2);
    assert!(summary.cleaned_up);

    let summary = scheduler.run_cycle();
    assert_eq!(summary.reporter_failures, 2);

    assert_eq!(failing.attempts.load(Ordering::Relaxed), 2);
    assert_eq!(remote.cycle_count(), 2);
    assert_eq!(remote.cleanups(), 2);

    scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timer_drives_cycles_until_shutdown() {
    let (registry, _clock) = test_registry();
    let local = CollectingReporter::new();

    let scheduler = ReportScheduler::start(
        Arc::clone(&registry),
        &config(Duration::from_millis(25), Duration::from_millis(50)),
        Some(Arc::clone(&local) as Arc<dyn MetricReporter>),
        None,
    )
    .unwrap();

    let requests = registry.counter("app.web.requests").unwrap();
    for _ in 0..10 {
        requests.increment();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(60)).await;
    scheduler.shutdown().await;

    let cycles = local.cycles();
    assert!(cycles.len() >= 2, "expected several cycles, got {}", cycles.len());
    // cleanup runs every second cycle
    assert_eq!(local.cleanups(), cycles.len() / 2);

    // every increment was reported exactly once
    let reported: i64 = cycles
        .iter()
        .flatten()
        .map(|r| match r {
            Reported::Counter(_, count) => *count,
            _ => 0,
        })
        .sum();
    assert_eq!(reported, 10);

    let after = local.cycle_count();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(local.cycle_count(), after);
}

#[tokio::test]
async fn test_request_timings_reach_reporter() {
    let (registry, _clock) = test_registry();
    let local = CollectingReporter::new();
    let scheduler = ReportScheduler::start(
        Arc::clone(&registry),
        &config(Duration::from_secs(3600), Duration::from_secs(3600)),
        Some(Arc::clone(&local) as Arc<dyn MetricReporter>),
        None,
    )
    .unwrap();

    for _ in 0..3 {
        let ctx = registry.request_context();
        let _handler = ctx.enter(MetricName::parse("app.web.handler"));
    }

    let summary = scheduler.run_cycle();
    assert_eq!(summary.request_timings, 3);
    assert_eq!(local.request_timings(), 3);

    scheduler.run_cycle();
    assert_eq!(local.request_timings(), 3);

    scheduler.shutdown().await;
}

#[test]
fn test_concurrent_cycles_report_each_series_once() {
    let (registry, _clock) = test_registry();
    let counters: Vec<_> = (0..50)
        .map(|i| registry.counter(MetricName::new("app", "svc", format!("op{}", i))).unwrap())
        .collect();

    for _ in 0..100 {
        for counter in &counters {
            counter.increment();
        }

        let local = CollectingReporter::new();
        let cycle = Arc::new(ReportCycle::new(
            Arc::clone(&registry),
            &ReportingConfig::default(),
            Some(Arc::clone(&local) as Arc<dyn MetricReporter>),
            None,
        ));
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cycle = Arc::clone(&cycle);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cycle.run()
                })
            })
            .collect();
        let collected: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap().metrics)
            .sum();

        let reported: Vec<Reported> = local.cycles().into_iter().flatten().collect();
        let names: HashSet<String> = reported
            .iter()
            .map(|r| match r {
                Reported::Counter(name, 1) => name.clone(),
                other => panic!("unexpected series {:?}", other),
            })
            .collect();
        assert_eq!(collected, 50);
        assert_eq!(reported.len(), 50);
        assert_eq!(names.len(), 50);
    }
}

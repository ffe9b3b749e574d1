//! Common test utilities and fixtures.

#![allow(dead_code)]

use metron::core::{ConfigBuilder, ManualClock, Result};
use metron::metrics::MetricVisitor;
use metron::metrics::{CounterStatistics, MetricName, TimedStatistics, ValueStatistics};
use metron::report::{MetricReporter, ReportMetrics};
use metron::{MetricRegistry, MetricsError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One reported series, flattened for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum Reported {
    Counter(String, i64),
    Value(String, i64, i64),
    Timed(String, i64, i64),
    GaugeLong(String, i64),
    GaugeDouble(String, f64),
}

#[derive(Default)]
struct Flatten {
    out: Vec<Reported>,
}

impl MetricVisitor for Flatten {
    fn visit_counter(&mut self, name: &MetricName, stats: &CounterStatistics) -> Result<()> {
        self.out.push(Reported::Counter(name.to_string(), stats.count));
        Ok(())
    }

    fn visit_value(&mut self, name: &MetricName, stats: &ValueStatistics) -> Result<()> {
        self.out
            .push(Reported::Value(name.to_string(), stats.count, stats.total));
        Ok(())
    }

    fn visit_timed(&mut self, name: &MetricName, stats: &TimedStatistics) -> Result<()> {
        self.out.push(Reported::Timed(
            name.to_string(),
            stats.success.count,
            stats.error.count,
        ));
        Ok(())
    }

    fn visit_gauge_long(&mut self, name: &MetricName, value: i64) -> Result<()> {
        self.out.push(Reported::GaugeLong(name.to_string(), value));
        Ok(())
    }

    fn visit_gauge_double(&mut self, name: &MetricName, value: f64) -> Result<()> {
        self.out.push(Reported::GaugeDouble(name.to_string(), value));
        Ok(())
    }
}

/// Reporter keeping every cycle's flattened output.
#[derive(Default)]
pub struct CollectingReporter {
    cycles: Mutex<Vec<Vec<Reported>>>,
    timings: AtomicUsize,
    cleanups: AtomicUsize,
}

impl CollectingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cycles(&self) -> Vec<Vec<Reported>> {
        self.cycles.lock().clone()
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.lock().len()
    }

    pub fn request_timings(&self) -> usize {
        self.timings.load(Ordering::Relaxed)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::Relaxed)
    }
}

impl MetricReporter for CollectingReporter {
    fn name(&self) -> &str {
        "collecting"
    }

    fn report(&self, metrics: &ReportMetrics) -> Result<()> {
        let mut flatten = Flatten::default();
        metrics.visit(&mut flatten)?;
        self.cycles.lock().push(flatten.out);
        self.timings
            .fetch_add(metrics.request_timings().len(), Ordering::Relaxed);
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Reporter that fails every call.
#[derive(Default)]
pub struct FailingReporter {
    pub attempts: AtomicUsize,
}

impl MetricReporter for FailingReporter {
    fn name(&self) -> &str {
        "failing"
    }

    fn report(&self, _metrics: &ReportMetrics) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(MetricsError::reporter("sink unavailable"))
    }

    fn cleanup(&self) -> Result<()> {
        Err(MetricsError::reporter("cleanup unavailable"))
    }
}

/// Registry with default configuration on a manual clock.
pub fn test_registry() -> (Arc<MetricRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    clock.set_millis(1_000);
    let config = ConfigBuilder::new().build().unwrap();
    let registry = MetricRegistry::with_clock(&config, Arc::clone(&clock) as Arc<dyn metron::core::Clock>).unwrap();
    (Arc::new(registry), clock)
}

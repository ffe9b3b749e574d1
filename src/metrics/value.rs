//! Running count/total/max accumulation.
//!
//! [`ValueCounter`] is the lock-free building block shared by value and
//! timed metrics. Updates from writer threads use relaxed atomics; the
//! single collector thread swaps the accumulators back to their initial
//! state once per report interval.

use crate::core::{Clock, MonotonicClock, Result};
use crate::metrics::metric::{Collectable, MetricVisitor};
use crate::metrics::name::MetricName;
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Max value meaning "no samples yet".
pub const NO_SAMPLES: i64 = i64::MIN;

/// Lock-free count, total and max of added values.
#[derive(Debug)]
pub struct ValueCounter {
    count: AtomicI64,
    total: AtomicI64,
    max: AtomicI64,
}

impl ValueCounter {
    pub fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
            total: AtomicI64::new(0),
            max: AtomicI64::new(NO_SAMPLES),
        }
    }

    /// Add a value (lock-free)
    #[inline]
    pub fn add(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(value, Ordering::Relaxed);
        self.update_max(value);
    }

    /// Update maximum value using compare-and-swap
    #[inline]
    fn update_max(&self, value: i64) {
        let mut current = self.max.load(Ordering::Relaxed);
        loop {
            if value <= current {
                break;
            }
            match self.max.compare_exchange_weak(
                current,
                value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current = x,
            }
        }
    }

    /// Reset count and total to zero and max to [`NO_SAMPLES`].
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
        self.max.store(NO_SAMPLES, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> i64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> i64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Snapshot the interval `[start_millis, now_millis)` and reset.
    ///
    /// Each field is swapped independently, so an `add` racing with this call
    /// may be split between this interval and the next.
    pub fn collect(&self, start_millis: i64, now_millis: i64) -> ValueStatistics {
        let count = self.count.swap(0, Ordering::Relaxed);
        let total = self.total.swap(0, Ordering::Relaxed);
        let max = self.max.swap(NO_SAMPLES, Ordering::Relaxed);
        ValueStatistics {
            count,
            total,
            max,
            start_millis,
            duration_millis: (now_millis - start_millis).max(0),
        }
    }
}

impl Default for ValueCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics of one value accumulator over one report interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValueStatistics {
    pub count: i64,
    pub total: i64,
    pub max: i64,
    /// Interval start, epoch millis
    pub start_millis: i64,
    pub duration_millis: i64,
}

impl ValueStatistics {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean value, 0 when there were no samples.
    pub fn mean(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.total / self.count
        }
    }

    /// Max value, 0 when there were no samples.
    pub fn max_or_zero(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.max
        }
    }

    /// Events per second over the interval, 0 for an empty interval.
    pub fn rate_per_second(&self) -> f64 {
        if self.duration_millis <= 0 {
            return 0.0;
        }
        self.count as f64 * 1000.0 / self.duration_millis as f64
    }
}

/// A named metric accumulating arbitrary values (bytes, rows, sizes).
pub trait ValueMetric: Collectable {
    fn add(&self, value: i64);

    fn count(&self) -> i64;

    fn total(&self) -> i64;

    fn max(&self) -> i64;
}

/// Accumulating [`ValueMetric`].
pub struct DefaultValueMetric {
    name: MetricName,
    values: ValueCounter,
    clock: Arc<dyn Clock>,
    interval_start: AtomicI64,
    collected: ArcSwapOption<ValueStatistics>,
}

impl DefaultValueMetric {
    pub fn new(name: MetricName) -> Self {
        Self::with_clock(name, Arc::new(MonotonicClock))
    }

    pub fn with_clock(name: MetricName, clock: Arc<dyn Clock>) -> Self {
        let start = clock.now_millis();
        Self {
            name,
            values: ValueCounter::new(),
            clock,
            interval_start: AtomicI64::new(start),
            collected: ArcSwapOption::empty(),
        }
    }

    /// Statistics captured by the last `collect_statistics`, if it was non-empty.
    pub fn collected(&self) -> Option<ValueStatistics> {
        self.collected.load().as_deref().copied()
    }
}

impl std::fmt::Debug for DefaultValueMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultValueMetric")
            .field("name", &self.name)
            .field("values", &self.values)
            .finish()
    }
}

impl Collectable for DefaultValueMetric {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        let now = self.clock.now_millis();
        let start = self.interval_start.swap(now, Ordering::Relaxed);
        let stats = self.values.collect(start, now);
        if stats.is_empty() {
            self.collected.store(None);
            false
        } else {
            self.collected.store(Some(Arc::new(stats)));
            true
        }
    }

    fn clear_statistics(&self) {
        self.values.reset();
        self.collected.store(None);
        self.interval_start
            .store(self.clock.now_millis(), Ordering::Relaxed);
    }

    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        match self.collected.load_full() {
            Some(stats) => visitor.visit_value(&self.name, &stats),
            None => Ok(()),
        }
    }
}

impl ValueMetric for DefaultValueMetric {
    #[inline]
    fn add(&self, value: i64) {
        self.values.add(value);
    }

    fn count(&self) -> i64 {
        self.values.count()
    }

    fn total(&self) -> i64 {
        self.values.total()
    }

    fn max(&self) -> i64 {
        self.values.max()
    }
}

/// [`ValueMetric`] handed out when collection is disabled.
#[derive(Debug)]
pub struct NoopValueMetric {
    name: MetricName,
}

impl NoopValueMetric {
    pub fn new(name: MetricName) -> Self {
        Self { name }
    }
}

impl Collectable for NoopValueMetric {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        false
    }

    fn clear_statistics(&self) {}

    fn visit(&self, _visitor: &mut dyn MetricVisitor) -> Result<()> {
        Ok(())
    }
}

impl ValueMetric for NoopValueMetric {
    #[inline]
    fn add(&self, _value: i64) {}

    fn count(&self) -> i64 {
        0
    }

    fn total(&self) -> i64 {
        0
    }

    fn max(&self) -> i64 {
        NO_SAMPLES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;

    #[test]
    fn test_value_counter() {
        let counter = ValueCounter::new();

        assert_eq!(counter.count(), 0);
        assert_eq!(counter.total(), 0);
        assert_eq!(counter.max(), NO_SAMPLES);

        counter.add(100);
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.total(), 100);
        assert_eq!(counter.max(), 100);

        counter.add(50);
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.total(), 150);
        assert_eq!(counter.max(), 100);

        counter.add(200);
        assert_eq!(counter.count(), 3);
        assert_eq!(counter.total(), 350);
        assert_eq!(counter.max(), 200);

        counter.add(20);
        assert_eq!(counter.count(), 4);
        assert_eq!(counter.total(), 370);
        assert_eq!(counter.max(), 200);

        counter.reset();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.total(), 0);
        assert_eq!(counter.max(), NO_SAMPLES);
    }

    #[test]
    fn test_reads_without_reset_accumulate() {
        let counter = ValueCounter::new();
        counter.add(100);
        assert_eq!(counter.count(), 1);

        counter.add(50);
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.total(), 150);
        assert_eq!(counter.max(), 100);
    }

    #[test]
    fn test_negative_values_track_max() {
        let counter = ValueCounter::new();
        counter.add(-10);
        counter.add(-30);
        assert_eq!(counter.max(), -10);
        assert_eq!(counter.total(), -40);
    }

    #[test]
    fn test_collect_resets() {
        let counter = ValueCounter::new();
        counter.add(10);
        counter.add(30);

        let stats = counter.collect(1_000, 3_000);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total, 40);
        assert_eq!(stats.max, 30);
        assert_eq!(stats.mean(), 20);
        assert_eq!(stats.duration_millis, 2_000);
        assert_eq!(stats.rate_per_second(), 1.0);

        assert!(counter.is_empty());
        assert_eq!(counter.max(), NO_SAMPLES);
    }

    #[test]
    fn test_empty_statistics_arithmetic() {
        let stats = ValueCounter::new().collect(0, 0);
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), 0);
        assert_eq!(stats.max_or_zero(), 0);
        assert_eq!(stats.rate_per_second(), 0.0);
    }

    #[test]
    fn test_concurrent_adds() {
        use std::thread;

        let counter = Arc::new(ValueCounter::new());
        let mut handles = vec![];

        for thread_id in 0..8i64 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for i in 0..1000i64 {
                    counter.add(thread_id * 1000 + i);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.count(), 8000);
        assert_eq!(counter.total(), (0..8000i64).sum::<i64>());
        assert_eq!(counter.max(), 7999);
    }

    #[test]
    fn test_value_metric_collect() {
        let clock = Arc::new(ManualClock::new());
        clock.set_millis(10_000);
        let metric =
            DefaultValueMetric::with_clock(MetricName::parse("app.upload.bytes"), Arc::clone(&clock) as Arc<dyn Clock>);

        assert!(!metric.collect_statistics());
        assert!(metric.collected().is_none());

        metric.add(512);
        metric.add(2048);
        clock.set_millis(12_000);

        assert!(metric.collect_statistics());
        let stats = metric.collected().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total, 2560);
        assert_eq!(stats.max, 2048);
        assert_eq!(stats.start_millis, 10_000);
        assert_eq!(stats.duration_millis, 2_000);

        assert_eq!(metric.count(), 0);
        assert!(!metric.collect_statistics());
    }

    #[test]
    fn test_clear_statistics() {
        let metric = DefaultValueMetric::new(MetricName::parse("app.upload.bytes"));
        metric.add(7);
        metric.clear_statistics();
        assert_eq!(metric.count(), 0);
        assert!(!metric.collect_statistics());
    }

    #[test]
    fn test_noop_value_metric() {
        let metric = NoopValueMetric::new(MetricName::parse("app.upload.bytes"));
        metric.add(100);
        assert_eq!(metric.count(), 0);
        assert!(!metric.collect_statistics());
    }
}

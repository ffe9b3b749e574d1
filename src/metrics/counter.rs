//! Event counters.

use crate::core::{Clock, MonotonicClock, Result};
use crate::metrics::metric::{Collectable, MetricVisitor};
use crate::metrics::name::MetricName;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Counter statistics for one report interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterStatistics {
    pub count: i64,
    /// Interval start, epoch millis
    pub start_millis: i64,
    pub duration_millis: i64,
}

impl CounterStatistics {
    /// Count per second over the interval, 0 for an empty interval.
    pub fn rate_per_second(&self) -> f64 {
        if self.duration_millis <= 0 {
            return 0.0;
        }
        self.count as f64 * 1000.0 / self.duration_millis as f64
    }
}

/// A named, adjustable count of events.
pub trait Counter: Collectable {
    fn add(&self, delta: i64);

    fn increment(&self) {
        self.add(1);
    }

    fn decrement(&self) {
        self.add(-1);
    }

    fn count(&self) -> i64;

    fn reset(&self);

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Lock-free [`Counter`] backed by a single atomic.
pub struct DefaultCounter {
    name: MetricName,
    count: AtomicI64,
    clock: Arc<dyn Clock>,
    interval_start: AtomicI64,
    /// Count captured by the last non-empty collect; 0 when nothing to report.
    collected: AtomicI64,
    collected_start: AtomicI64,
    collected_duration: AtomicI64,
}

impl DefaultCounter {
    pub fn new(name: MetricName) -> Self {
        Self::with_clock(name, Arc::new(MonotonicClock))
    }

    pub fn with_clock(name: MetricName, clock: Arc<dyn Clock>) -> Self {
        let start = clock.now_millis();
        Self {
            name,
            count: AtomicI64::new(0),
            clock,
            interval_start: AtomicI64::new(start),
            collected: AtomicI64::new(0),
            collected_start: AtomicI64::new(start),
            collected_duration: AtomicI64::new(0),
        }
    }

    /// Statistics captured by the last `collect_statistics`, if it was non-empty.
    pub fn collected(&self) -> Option<CounterStatistics> {
        let count = self.collected.load(Ordering::Acquire);
        if count == 0 {
            return None;
        }
        Some(CounterStatistics {
            count,
            start_millis: self.collected_start.load(Ordering::Relaxed),
            duration_millis: self.collected_duration.load(Ordering::Relaxed),
        })
    }
}

impl std::fmt::Debug for DefaultCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCounter")
            .field("name", &self.name)
            .field("count", &self.count)
            .finish()
    }
}

impl Collectable for DefaultCounter {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        let now = self.clock.now_millis();
        let start = self.interval_start.swap(now, Ordering::Relaxed);
        let count = self.count.swap(0, Ordering::Relaxed);

        self.collected_start.store(start, Ordering::Relaxed);
        self.collected_duration
            .store((now - start).max(0), Ordering::Relaxed);
        self.collected.store(count, Ordering::Release);
        count != 0
    }

    fn clear_statistics(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.collected.store(0, Ordering::Release);
        self.interval_start
            .store(self.clock.now_millis(), Ordering::Relaxed);
    }

    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        match self.collected() {
            Some(stats) => visitor.visit_counter(&self.name, &stats),
            None => Ok(()),
        }
    }
}

impl Counter for DefaultCounter {
    #[inline]
    fn add(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

/// [`Counter`] handed out when collection is disabled.
#[derive(Debug)]
pub struct NoopCounter {
    name: MetricName,
}

impl NoopCounter {
    pub fn new(name: MetricName) -> Self {
        Self { name }
    }
}

impl Collectable for NoopCounter {
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

impl Counter for NoopCounter {
    #[inline]
    fn add(&self, _delta: i64) {}

    fn count(&self) -> i64 {
        0
    }

    fn reset(&self) {}
}

//! Duration accumulation split by outcome.
//!
//! A timed metric keeps two [`ValueCounter`]s, one for successful events and
//! one for failed events, both recording elapsed nanoseconds. The error side
//! is reported under `<name>.error`.

use crate::core::{Clock, MonotonicClock, Result};
use crate::metrics::metric::{Collectable, MetricVisitor};
use crate::metrics::name::MetricName;
use crate::metrics::value::{ValueCounter, ValueStatistics};
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Suffix appended to a timed metric's name for its error series.
pub const ERROR_SUFFIX: &str = "error";

/// Sink for completed event durations.
pub trait TimedRecorder {
    /// Record an event that took `nanos`.
    fn add_event_duration(&self, success: bool, nanos: i64);

    /// Current tick of the clock this recorder measures against.
    fn tick_nanos(&self) -> i64;

    /// Record an event started at `start_nanos` (a previous [`tick_nanos`](Self::tick_nanos)).
    fn add_event_since(&self, success: bool, start_nanos: i64) {
        let elapsed = self.tick_nanos() - start_nanos;
        self.add_event_duration(success, elapsed.max(0));
    }
}

/// A named metric timing events with a success/error split.
pub trait TimedMetric: Collectable + TimedRecorder {
    /// Successful events recorded in the current interval.
    fn success_count(&self) -> i64;

    /// Failed events recorded in the current interval.
    fn error_count(&self) -> i64;
}

impl dyn TimedMetric {
    /// Start timing an event; finish it with the returned guard.
    pub fn start_event(&self) -> TimedEvent<'_, dyn TimedMetric> {
        TimedEvent::start(self)
    }

    /// Time `f`, recording an `Ok` as success and an `Err` as error.
    pub fn time<T, E>(&self, f: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E> {
        let start = self.tick_nanos();
        let result = f();
        self.add_event_since(result.is_ok(), start);
        result
    }
}

/// An in-flight timed event.
///
/// Dropping the event without calling one of the `end` methods records it
/// as an error, so early returns and panics count as failures.
#[must_use = "a timed event records nothing until it is ended or dropped"]
pub struct TimedEvent<'a, M: TimedRecorder + ?Sized> {
    metric: &'a M,
    start_nanos: i64,
    finished: bool,
}

impl<'a, M: TimedRecorder + ?Sized> TimedEvent<'a, M> {
    pub fn start(metric: &'a M) -> Self {
        Self {
            metric,
            start_nanos: metric.tick_nanos(),
            finished: false,
        }
    }

    pub fn start_nanos(&self) -> i64 {
        self.start_nanos
    }

    pub fn end_with_success(self) {
        self.end(true);
    }

    pub fn end_with_error(self) {
        self.end(false);
    }

    pub fn end(mut self, success: bool) {
        self.finished = true;
        self.metric.add_event_since(success, self.start_nanos);
    }
}

impl<M: TimedRecorder + ?Sized> Drop for TimedEvent<'_, M> {
    fn drop(&mut self) {
        if !self.finished {
            self.metric.add_event_since(false, self.start_nanos);
        }
    }
}

/// Statistics of a timed metric over one report interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedStatistics {
    pub success: ValueStatistics,
    pub error: ValueStatistics,
    /// `lower-upper` (millis) when this metric is one bucket of a bucket metric
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_range: Option<String>,
}

impl TimedStatistics {
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.error.is_empty()
    }

    pub fn total_count(&self) -> i64 {
        self.success.count + self.error.count
    }

    /// Share of failed events, 0 when there were no events.
    pub fn error_percentage(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        self.error.count as f64 * 100.0 / total as f64
    }
}

/// Lock-free [`TimedMetric`].
pub struct DefaultTimedMetric {
    name: MetricName,
    success: ValueCounter,
    error: ValueCounter,
    bucket_range: Option<String>,
    clock: Arc<dyn Clock>,
    interval_start: AtomicI64,
    collected: ArcSwapOption<TimedStatistics>,
}

impl DefaultTimedMetric {
    pub fn new(name: MetricName) -> Self {
        Self::with_clock(name, Arc::new(MonotonicClock))
    }

    pub fn with_clock(name: MetricName, clock: Arc<dyn Clock>) -> Self {
        Self::build(name, None, clock)
    }

    /// One bucket of a bucket timed metric.
    pub(crate) fn bucket(name: MetricName, range: String, clock: Arc<dyn Clock>) -> Self {
        Self::build(name, Some(range), clock)
    }

    fn build(name: MetricName, bucket_range: Option<String>, clock: Arc<dyn Clock>) -> Self {
        let start = clock.now_millis();
        Self {
            name,
            success: ValueCounter::new(),
            error: ValueCounter::new(),
            bucket_range,
            clock,
            interval_start: AtomicI64::new(start),
            collected: ArcSwapOption::empty(),
        }
    }

    /// Statistics captured by the last `collect_statistics`, if it was non-empty.
    pub fn collected(&self) -> Option<TimedStatistics> {
        self.collected.load().as_deref().cloned()
    }

    pub fn bucket_range(&self) -> Option<&str> {
        self.bucket_range.as_deref()
    }

    /// Name of the error series.
    pub fn error_name(&self) -> MetricName {
        self.name.with_suffix(ERROR_SUFFIX)
    }
}

impl std::fmt::Debug for DefaultTimedMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultTimedMetric")
            .field("name", &self.name)
            .field("success", &self.success)
            .field("error", &self.error)
            .field("bucket_range", &self.bucket_range)
            .finish()
    }
}

impl Collectable for DefaultTimedMetric {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        let now = self.clock.now_millis();
        let start = self.interval_start.swap(now, Ordering::Relaxed);
        let stats = TimedStatistics {
            success: self.success.collect(start, now),
            error: self.error.collect(start, now),
            bucket_range: self.bucket_range.clone(),
        };
        if stats.is_empty() {
            self.collected.store(None);
            false
        } else {
            self.collected.store(Some(Arc::new(stats)));
            true
        }
    }

    fn clear_statistics(&self) {
        self.success.reset();
        self.error.reset();
        self.collected.store(None);
        self.interval_start
            .store(self.clock.now_millis(), Ordering::Relaxed);
    }

    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        match self.collected.load_full() {
            Some(stats) => visitor.visit_timed(&self.name, &stats),
            None => Ok(()),
        }
    }
}

impl TimedRecorder for DefaultTimedMetric {
    #[inline]
    fn add_event_duration(&self, success: bool, nanos: i64) {
        if success {
            self.success.add(nanos);
        } else {
            self.error.add(nanos);
        }
    }

    #[inline]
    fn tick_nanos(&self) -> i64 {
        self.clock.tick_nanos()
    }
}

impl TimedMetric for DefaultTimedMetric {
    fn success_count(&self) -> i64 {
        self.success.count()
    }

    fn error_count(&self) -> i64 {
        self.error.count()
    }
}

/// [`TimedMetric`] handed out when collection is disabled.
#[derive(Debug)]
pub struct NoopTimedMetric {
    name: MetricName,
}

impl NoopTimedMetric {
    pub fn new(name: MetricName) -> Self {
        Self { name }
    }
}

impl Collectable for NoopTimedMetric {
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

impl TimedRecorder for NoopTimedMetric {
    #[inline]
    fn add_event_duration(&self, _success: bool, _nanos: i64) {}

    #[inline]
    fn tick_nanos(&self) -> i64 {
        0
    }
}

impl TimedMetric for NoopTimedMetric {
    fn success_count(&self) -> i64 {
        0
    }

    fn error_count(&self) -> i64 {
        0
    }
}

//! The polymorphic metric handle stored in the registry.

use crate::core::Result;
use crate::metrics::bucket::BucketTimedMetric;
use crate::metrics::counter::{Counter, CounterStatistics};
use crate::metrics::gauge::{GaugeDoubleMetric, GaugeGroup, GaugeLongMetric};
use crate::metrics::name::MetricName;
use crate::metrics::timed::{TimedMetric, TimedStatistics};
use crate::metrics::value::{ValueMetric, ValueStatistics};
use std::fmt;
use std::sync::Arc;

/// Behaviour shared by every metric variant.
pub trait Collectable: Send + Sync + fmt::Debug {
    fn name(&self) -> &MetricName;

    /// Snapshot the current interval and reset interval-scoped state.
    ///
    /// Returns true when the snapshot is worth reporting. The snapshot stays
    /// available to [`visit`](Self::visit) until the next call.
    fn collect_statistics(&self) -> bool;

    /// Discard accumulated state without producing a snapshot.
    fn clear_statistics(&self);

    /// Walk the last collected snapshot.
    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()>;
}

/// Receives collected statistics, one call per reportable series.
pub trait MetricVisitor {
    fn visit_counter(&mut self, name: &MetricName, stats: &CounterStatistics) -> Result<()>;

    fn visit_value(&mut self, name: &MetricName, stats: &ValueStatistics) -> Result<()>;

    fn visit_timed(&mut self, name: &MetricName, stats: &TimedStatistics) -> Result<()>;

    fn visit_gauge_long(&mut self, name: &MetricName, value: i64) -> Result<()>;

    fn visit_gauge_double(&mut self, name: &MetricName, value: f64) -> Result<()>;
}

/// Any metric tracked by name in the registry.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<dyn Counter>),
    Value(Arc<dyn ValueMetric>),
    Timed(Arc<dyn TimedMetric>),
    BucketTimed(Arc<dyn BucketTimedMetric>),
    GaugeLong(Arc<GaugeLongMetric>),
    GaugeDouble(Arc<GaugeDoubleMetric>),
    GaugeGroup(Arc<GaugeGroup>),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Metric::Counter($m) => $body,
            Metric::Value($m) => $body,
            Metric::Timed($m) => $body,
            Metric::BucketTimed($m) => $body,
            Metric::GaugeLong($m) => $body,
            Metric::GaugeDouble($m) => $body,
            Metric::GaugeGroup($m) => $body,
        }
    };
}

impl Metric {
    pub fn name(&self) -> &MetricName {
        dispatch!(self, m => m.name())
    }

    pub fn collect_statistics(&self) -> bool {
        dispatch!(self, m => m.collect_statistics())
    }

    pub fn clear_statistics(&self) {
        dispatch!(self, m => m.clear_statistics())
    }

    pub fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        dispatch!(self, m => m.visit(visitor))
    }

    /// Short kind label used in logs and kind-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Metric::Counter(_) => "counter",
            Metric::Value(_) => "value",
            Metric::Timed(_) => "timed",
            Metric::BucketTimed(_) => "bucket_timed",
            Metric::GaugeLong(_) => "gauge_long",
            Metric::GaugeDouble(_) => "gauge_double",
            Metric::GaugeGroup(_) => "gauge_group",
        }
    }

    /// True when both handles point at the same metric instance.
    pub fn ptr_eq(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(a), Metric::Counter(b)) => same_instance(a, b),
            (Metric::Value(a), Metric::Value(b)) => same_instance(a, b),
            (Metric::Timed(a), Metric::Timed(b)) => same_instance(a, b),
            (Metric::BucketTimed(a), Metric::BucketTimed(b)) => same_instance(a, b),
            (Metric::GaugeLong(a), Metric::GaugeLong(b)) => Arc::ptr_eq(a, b),
            (Metric::GaugeDouble(a), Metric::GaugeDouble(b)) => Arc::ptr_eq(a, b),
            (Metric::GaugeGroup(a), Metric::GaugeGroup(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Compares data pointers only; vtable pointers of the same type may differ
/// across codegen units.
fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const u8, Arc::as_ptr(b) as *const u8)
}

impl From<Arc<GaugeLongMetric>> for Metric {
    fn from(metric: Arc<GaugeLongMetric>) -> Self {
        Metric::GaugeLong(metric)
    }
}

impl From<Arc<GaugeDoubleMetric>> for Metric {
    fn from(metric: Arc<GaugeDoubleMetric>) -> Self {
        Metric::GaugeDouble(metric)
    }
}

impl From<Arc<GaugeGroup>> for Metric {
    fn from(metric: Arc<GaugeGroup>) -> Self {
        Metric::GaugeGroup(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::counter::DefaultCounter;
    use crate::metrics::timed::DefaultTimedMetric;

    #[test]
    fn test_dispatch_and_kind() {
        let counter: Arc<dyn Counter> = Arc::new(DefaultCounter::new(MetricName::parse("a.b.c")));
        counter.increment();

        let metric = Metric::Counter(Arc::clone(&counter));
        assert_eq!(metric.kind(), "counter");
        assert_eq!(metric.name().simple_name(), "a.b.c");
        assert!(metric.collect_statistics());
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_ptr_eq() {
        let counter: Arc<dyn Counter> = Arc::new(DefaultCounter::new(MetricName::parse("a.b.c")));
        let first = Metric::Counter(Arc::clone(&counter));
        let second = first.clone();
        assert!(first.ptr_eq(&second));

        let other = Metric::Counter(Arc::new(DefaultCounter::new(MetricName::parse("a.b.c"))));
        assert!(!first.ptr_eq(&other));

        let timed = Metric::Timed(Arc::new(DefaultTimedMetric::new(MetricName::parse("a.b.c"))));
        assert!(!first.ptr_eq(&timed));
    }
}

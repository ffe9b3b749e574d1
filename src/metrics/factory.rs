//! Metric construction.
//!
//! The registry owns one [`MetricFactory`], picked once from configuration.
//! When collection is disabled every metric comes from [`NoopMetricFactory`],
//! so recording calls never check whether collection is on.

use crate::core::{Clock, MonotonicClock, Result};
use crate::metrics::bucket::{BucketTimedMetric, DefaultBucketTimedMetric, NoopBucketTimedMetric};
use crate::metrics::counter::{Counter, DefaultCounter, NoopCounter};
use crate::metrics::name::MetricName;
use crate::metrics::timed::{DefaultTimedMetric, NoopTimedMetric, TimedMetric};
use crate::metrics::value::{DefaultValueMetric, NoopValueMetric, ValueMetric};
use std::sync::Arc;

/// Creates metrics of each accumulating kind.
pub trait MetricFactory: Send + Sync {
    fn create_counter(&self, name: MetricName) -> Arc<dyn Counter>;

    fn create_value_metric(&self, name: MetricName) -> Arc<dyn ValueMetric>;

    fn create_timed_metric(&self, name: MetricName) -> Arc<dyn TimedMetric>;

    /// Fails with `InvalidBuckets` when `bounds_millis` is empty or not ascending.
    fn create_bucket_timed_metric(
        &self,
        name: MetricName,
        bounds_millis: &[i64],
    ) -> Result<Arc<dyn BucketTimedMetric>>;

    fn is_noop(&self) -> bool {
        false
    }
}

/// Factory for accumulating metrics sharing one clock.
pub struct DefaultMetricFactory {
    clock: Arc<dyn Clock>,
}

impl DefaultMetricFactory {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for DefaultMetricFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricFactory for DefaultMetricFactory {
    fn create_counter(&self, name: MetricName) -> Arc<dyn Counter> {
        Arc::new(DefaultCounter::with_clock(name, Arc::clone(&self.clock)))
    }

    fn create_value_metric(&self, name: MetricName) -> Arc<dyn ValueMetric> {
        Arc::new(DefaultValueMetric::with_clock(name, Arc::clone(&self.clock)))
    }

    fn create_timed_metric(&self, name: MetricName) -> Arc<dyn TimedMetric> {
        Arc::new(DefaultTimedMetric::with_clock(name, Arc::clone(&self.clock)))
    }

    fn create_bucket_timed_metric(
        &self,
        name: MetricName,
        bounds_millis: &[i64],
    ) -> Result<Arc<dyn BucketTimedMetric>> {
        let metric =
            DefaultBucketTimedMetric::with_clock(name, bounds_millis, Arc::clone(&self.clock))?;
        Ok(Arc::new(metric))
    }
}

/// Factory producing metrics that record nothing.
#[derive(Debug, Default)]
pub struct NoopMetricFactory;

impl MetricFactory for NoopMetricFactory {
    fn create_counter(&self, name: MetricName) -> Arc<dyn Counter> {
        Arc::new(NoopCounter::new(name))
    }

    fn create_value_metric(&self, name: MetricName) -> Arc<dyn ValueMetric> {
        Arc::new(NoopValueMetric::new(name))
    }

    fn create_timed_metric(&self, name: MetricName) -> Arc<dyn TimedMetric> {
        Arc::new(NoopTimedMetric::new(name))
    }

    fn create_bucket_timed_metric(
        &self,
        name: MetricName,
        bounds_millis: &[i64],
    ) -> Result<Arc<dyn BucketTimedMetric>> {
        Ok(Arc::new(NoopBucketTimedMetric::new(name, bounds_millis)?))
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Pick the factory for a collection switch.
pub fn factory_for(disabled: bool, clock: Arc<dyn Clock>) -> Box<dyn MetricFactory> {
    if disabled {
        Box::new(NoopMetricFactory)
    } else {
        Box::new(DefaultMetricFactory::with_clock(clock))
    }
}

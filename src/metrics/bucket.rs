//! Timed metrics partitioned into fixed duration buckets.
//!
//! Bucket bounds are given in milliseconds, ascending. `n` bounds define
//! `n + 1` buckets; a duration lands in the first bucket whose upper bound
//! is strictly greater than it, so a duration equal to a bound falls into
//! the bucket above.

use crate::core::{Clock, MetricsError, MonotonicClock, Result};
use crate::metrics::metric::{Collectable, MetricVisitor};
use crate::metrics::name::MetricName;
use crate::metrics::timed::{DefaultTimedMetric, TimedEvent, TimedRecorder};
use smallvec::SmallVec;
use std::sync::Arc;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// A timed metric whose events are split into duration buckets.
pub trait BucketTimedMetric: Collectable + TimedRecorder {
    /// Upper bounds in millis, ascending.
    fn bucket_bounds_millis(&self) -> &[i64];

    /// Index of the bucket a duration lands in; `bounds.len()` is the overflow bucket.
    fn bucket_index(&self, nanos: i64) -> usize;
}

impl dyn BucketTimedMetric {
    /// Start timing an event; finish it with the returned guard.
    pub fn start_event(&self) -> TimedEvent<'_, dyn BucketTimedMetric> {
        TimedEvent::start(self)
    }
}

/// Check bounds are non-empty and strictly ascending.
pub fn validate_bounds(bounds_millis: &[i64]) -> Result<()> {
    if bounds_millis.is_empty() {
        return Err(MetricsError::invalid_buckets("at least one bucket bound is required"));
    }
    if let Some(&first) = bounds_millis.first() {
        if first <= 0 {
            return Err(MetricsError::invalid_buckets(format!(
                "bucket bounds must be positive, got {}",
                first
            )));
        }
    }
    if let Some(pair) = bounds_millis.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(MetricsError::invalid_buckets(format!(
            "bucket bounds must be strictly ascending, got {} then {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Index of the first bound strictly greater than `nanos`, else `bounds.len()`.
#[inline]
pub fn bucket_index(bounds_nanos: &[i64], nanos: i64) -> usize {
    bounds_nanos.partition_point(|&bound| bound <= nanos)
}

/// Range labels for each bucket: `lower-upper` and `lower+` for the overflow bucket.
pub fn bucket_labels(bounds_millis: &[i64]) -> Vec<String> {
    let mut labels = Vec::with_capacity(bounds_millis.len() + 1);
    let mut lower = 0;
    for &upper in bounds_millis {
        labels.push(format!("{}-{}", lower, upper));
        lower = upper;
    }
    labels.push(format!("{}+", lower));
    labels
}

/// [`BucketTimedMetric`] holding one [`DefaultTimedMetric`] per bucket.
pub struct DefaultBucketTimedMetric {
    name: MetricName,
    bounds_millis: Vec<i64>,
    bounds_nanos: SmallVec<[i64; 8]>,
    buckets: Vec<DefaultTimedMetric>,
    clock: Arc<dyn Clock>,
}

impl DefaultBucketTimedMetric {
    pub fn new(name: MetricName, bounds_millis: &[i64]) -> Result<Self> {
        Self::with_clock(name, bounds_millis, Arc::new(MonotonicClock))
    }

    pub fn with_clock(
        name: MetricName,
        bounds_millis: &[i64],
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        validate_bounds(bounds_millis)?;

        let bounds_nanos = bounds_millis
            .iter()
            .map(|millis| millis.saturating_mul(NANOS_PER_MILLI))
            .collect();
        let buckets = bucket_labels(bounds_millis)
            .into_iter()
            .map(|label| {
                DefaultTimedMetric::bucket(name.with_suffix(&label), label, Arc::clone(&clock))
            })
            .collect();

        Ok(Self {
            name,
            bounds_millis: bounds_millis.to_vec(),
            bounds_nanos,
            buckets,
            clock,
        })
    }

    /// The per-bucket timed metrics, overflow bucket last.
    pub fn buckets(&self) -> &[DefaultTimedMetric] {
        &self.buckets
    }
}

impl std::fmt::Debug for DefaultBucketTimedMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultBucketTimedMetric")
            .field("name", &self.name)
            .field("bounds_millis", &self.bounds_millis)
            .field("buckets", &self.buckets)
            .finish()
    }
}

impl Collectable for DefaultBucketTimedMetric {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        // Every bucket must be collected so each one resets.
        self.buckets
            .iter()
            .fold(false, |any, bucket| bucket.collect_statistics() || any)
    }

    fn clear_statistics(&self) {
        for bucket in &self.buckets {
            bucket.clear_statistics();
        }
    }

    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        for bucket in &self.buckets {
            bucket.visit(visitor)?;
        }
        Ok(())
    }
}

impl TimedRecorder for DefaultBucketTimedMetric {
    #[inline]
    fn add_event_duration(&self, success: bool, nanos: i64) {
        let index = bucket_index(&self.bounds_nanos, nanos);
        self.buckets[index].add_event_duration(success, nanos);
    }

    #[inline]
    fn tick_nanos(&self) -> i64 {
        self.clock.tick_nanos()
    }
}

impl BucketTimedMetric for DefaultBucketTimedMetric {
    fn bucket_bounds_millis(&self) -> &[i64] {
        &self.bounds_millis
    }

    fn bucket_index(&self, nanos: i64) -> usize {
        bucket_index(&self.bounds_nanos, nanos)
    }
}

/// [`BucketTimedMetric`] handed out when collection is disabled.
///
/// Bounds are still validated so a bad configuration fails the same way
/// whether or not collection is enabled.
#[derive(Debug)]
pub struct NoopBucketTimedMetric {
    name: MetricName,
    bounds_millis: Vec<i64>,
}

impl NoopBucketTimedMetric {
    pub fn new(name: MetricName, bounds_millis: &[i64]) -> Result<Self> {
        validate_bounds(bounds_millis)?;
        Ok(Self {
            name,
            bounds_millis: bounds_millis.to_vec(),
        })
    }
}

impl Collectable for NoopBucketTimedMetric {
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

impl TimedRecorder for NoopBucketTimedMetric {
    #[inline]
    fn add_event_duration(&self, _success: bool, _nanos: i64) {}

    #[inline]
    fn tick_nanos(&self) -> i64 {
        0
    }
}

impl BucketTimedMetric for NoopBucketTimedMetric {
    fn bucket_bounds_millis(&self) -> &[i64] {
        &self.bounds_millis
    }

    fn bucket_index(&self, _nanos: i64) -> usize {
        0
    }
}

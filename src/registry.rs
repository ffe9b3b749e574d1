//! Name-keyed metric registry.
//!
//! The registry caches every metric by its simple name. Lookups of existing
//! metrics are lock-free reads of a [`DashMap`]; first creation of a name
//! takes a single creation mutex and re-checks the cache, so racing callers
//! all observe the one instance that was published.
//!
//! Platform metrics (runtime and OS gauges registered at startup) live in a
//! separate cache that [`MetricRegistry::clear`] leaves alone.

use crate::core::{Clock, Config, MetricsError, MonotonicClock, Result};
use crate::metrics::factory::factory_for;
use crate::metrics::{
    BucketTimedMetric, Counter, GaugeDouble, GaugeDoubleMetric, GaugeLong, GaugeLongMetric,
    Metric, MetricFactory, MetricName, TimedMetric, ValueMetric,
};
use crate::timing::{ExternalRequestIdAdapter, RequestContext, RequestTiming, RequestTimingQueue};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Kind of metric to create on a cache miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Value,
    Timed,
    /// Bucket upper bounds in millis, ascending
    BucketTimed(Vec<i64>),
}

impl MetricKind {
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Value => "value",
            MetricKind::Timed => "timed",
            MetricKind::BucketTimed(_) => "bucket_timed",
        }
    }
}

/// Registry of application and platform metrics.
pub struct MetricRegistry {
    factory: Box<dyn MetricFactory>,
    metrics: DashMap<String, Metric>,
    platform: DashMap<String, Metric>,
    /// Serialises metric creation; never held on the lookup fast path.
    create_lock: Mutex<()>,
    timings: Arc<RequestTimingQueue>,
    adapter: Option<Arc<dyn ExternalRequestIdAdapter>>,
    clock: Arc<dyn Clock>,
}

impl MetricRegistry {
    /// Create a registry from validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let factory = factory_for(config.collection.disabled, Arc::clone(&clock));
        debug!(
            disabled = config.collection.disabled,
            request_timing_capacity = config.collection.request_timing_capacity,
            "Creating metric registry"
        );
        Ok(Self {
            factory,
            metrics: DashMap::new(),
            platform: DashMap::new(),
            create_lock: Mutex::new(()),
            timings: Arc::new(RequestTimingQueue::new(
                config.collection.request_timing_capacity,
            )),
            adapter: None,
            clock,
        })
    }

    /// Tag completed request timings using `adapter`.
    pub fn with_request_id_adapter(mut self, adapter: Arc<dyn ExternalRequestIdAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn is_collection_disabled(&self) -> bool {
        self.factory.is_noop()
    }

    /// Return the metric registered under `name`, creating it when absent.
    ///
    /// Concurrent first calls for one name construct exactly one metric.
    /// When the name is already taken by another kind the existing metric is
    /// returned unchanged.
    pub fn get_or_create(&self, name: &MetricName, kind: MetricKind) -> Result<Metric> {
        if let Some(existing) = self.metrics.get(name.simple_name()) {
            return Ok(existing.value().clone());
        }

        let _guard = self.create_lock.lock();
        if let Some(existing) = self.metrics.get(name.simple_name()) {
            return Ok(existing.value().clone());
        }

        let metric = self.create(name.clone(), &kind)?;
        debug!(metric = %name, kind = kind.label(), "Created metric");
        self.metrics
            .insert(name.simple_name().to_string(), metric.clone());
        Ok(metric)
    }

    fn create(&self, name: MetricName, kind: &MetricKind) -> Result<Metric> {
        Ok(match kind {
            MetricKind::Counter => Metric::Counter(self.factory.create_counter(name)),
            MetricKind::Value => Metric::Value(self.factory.create_value_metric(name)),
            MetricKind::Timed => Metric::Timed(self.factory.create_timed_metric(name)),
            MetricKind::BucketTimed(bounds) => {
                Metric::BucketTimed(self.factory.create_bucket_timed_metric(name, bounds)?)
            }
        })
    }

    /// Counter registered under `name`.
    pub fn counter(&self, name: impl Into<MetricName>) -> Result<Arc<dyn Counter>> {
        let name = name.into();
        match self.get_or_create(&name, MetricKind::Counter)? {
            Metric::Counter(counter) => Ok(counter),
            other => Err(kind_mismatch(&name, "counter", &other)),
        }
    }

    /// Value metric registered under `name`.
    pub fn value_metric(&self, name: impl Into<MetricName>) -> Result<Arc<dyn ValueMetric>> {
        let name = name.into();
        match self.get_or_create(&name, MetricKind::Value)? {
            Metric::Value(metric) => Ok(metric),
            other => Err(kind_mismatch(&name, "value", &other)),
        }
    }

    /// Timed metric registered under `name`.
    pub fn timed_metric(&self, name: impl Into<MetricName>) -> Result<Arc<dyn TimedMetric>> {
        let name = name.into();
        match self.get_or_create(&name, MetricKind::Timed)? {
            Metric::Timed(metric) => Ok(metric),
            other => Err(kind_mismatch(&name, "timed", &other)),
        }
    }

    /// Bucket timed metric registered under `name`.
    ///
    /// `bounds_millis` only applies on first creation; later calls return the
    /// existing metric with its original bounds.
    pub fn bucket_timed_metric(
        &self,
        name: impl Into<MetricName>,
        bounds_millis: &[i64],
    ) -> Result<Arc<dyn BucketTimedMetric>> {
        let name = name.into();
        let metric = match self.get(name.simple_name()) {
            Some(existing) => existing,
            None => self.get_or_create(&name, MetricKind::BucketTimed(bounds_millis.to_vec()))?,
        };
        match metric {
            Metric::BucketTimed(metric) => Ok(metric),
            other => Err(kind_mismatch(&name, "bucket_timed", &other)),
        }
    }

    /// Install a caller-built metric (typically a gauge) under its own name.
    ///
    /// Returns the metric now registered under that name, which is the
    /// existing one if the name was already taken.
    pub fn register(&self, metric: impl Into<Metric>) -> Metric {
        let metric = metric.into();
        publish(&self.metrics, &self.create_lock, metric)
    }

    /// Register a raw integer gauge over `source`.
    pub fn register_gauge_long(
        &self,
        name: impl Into<MetricName>,
        source: impl GaugeLong + 'static,
    ) -> Metric {
        self.register(Arc::new(GaugeLongMetric::new(name.into(), source)))
    }

    /// Register a raw floating point gauge over `source`.
    pub fn register_gauge_double(
        &self,
        name: impl Into<MetricName>,
        source: impl GaugeDouble + 'static,
    ) -> Metric {
        self.register(Arc::new(GaugeDoubleMetric::new(name.into(), source)))
    }

    /// Register a platform metric into the platform cache.
    pub fn register_platform(&self, metric: impl Into<Metric>) -> Metric {
        let metric = metric.into();
        publish(&self.platform, &self.create_lock, metric)
    }

    /// Register a platform gauge when its source is available on this host.
    ///
    /// Returns false, and registers nothing, when `source` is `None`.
    pub fn register_platform_gauge<G>(&self, name: impl Into<MetricName>, source: Option<G>) -> bool
    where
        G: GaugeDouble + 'static,
    {
        let name = name.into();
        match source {
            Some(source) => {
                self.register_platform(Arc::new(GaugeDoubleMetric::new(name, source)));
                true
            }
            None => {
                debug!(metric = %name, "Platform gauge source unavailable, skipping");
                false
            }
        }
    }

    /// Collect every application metric and return those with data, sorted by name.
    ///
    /// This consumes the interval: each metric snapshots and resets. The
    /// snapshot lives in the metric until the next collection, so callers
    /// must visit the result before collecting again; [`ReportCycle`]
    /// serialises its cycles for this reason.
    ///
    /// [`ReportCycle`]: crate::report::ReportCycle
    pub fn collect_non_empty_metrics(&self) -> Vec<Metric> {
        collect_non_empty(&self.metrics)
    }

    /// Collect every platform metric and return those with data, sorted by name.
    pub fn collect_non_empty_platform_metrics(&self) -> Vec<Metric> {
        collect_non_empty(&self.platform)
    }

    /// Snapshot of the application metrics, unordered.
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Snapshot of the platform metrics, unordered.
    pub fn platform_metrics(&self) -> Vec<Metric> {
        self.platform.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Drop all application metrics. Platform metrics are kept.
    ///
    /// Handles already given out keep working but are no longer reported.
    pub fn clear(&self) {
        let _guard = self.create_lock.lock();
        for entry in self.metrics.iter() {
            entry.value().clear_statistics();
        }
        self.metrics.clear();
        debug!("Cleared application metrics");
    }

    /// Drain request timings completed since the last call, oldest first.
    pub fn collect_request_timings(&self) -> Vec<RequestTiming> {
        self.timings.drain()
    }

    /// Request timings evicted because the buffer was full.
    pub fn dropped_request_timings(&self) -> u64 {
        self.timings.dropped_count()
    }

    /// A fresh capture context for one logical request.
    pub fn request_context(&self) -> RequestContext {
        let sink = if self.factory.is_noop() {
            None
        } else {
            Some(Arc::clone(&self.timings))
        };
        RequestContext::new(Arc::clone(&self.clock), sink, self.adapter.clone())
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.metrics.len())
            .field("platform", &self.platform.len())
            .field("disabled", &self.factory.is_noop())
            .field("timings", &self.timings)
            .finish()
    }
}

fn publish(cache: &DashMap<String, Metric>, lock: &Mutex<()>, metric: Metric) -> Metric {
    let _guard = lock.lock();
    let key = metric.name().simple_name().to_string();
    cache.entry(key).or_insert(metric).value().clone()
}

fn collect_non_empty(cache: &DashMap<String, Metric>) -> Vec<Metric> {
    // Clone out first so no shard lock is held while sources are read.
    let all: Vec<Metric> = cache.iter().map(|entry| entry.value().clone()).collect();
    let mut reportable: Vec<Metric> = all
        .into_iter()
        .filter(Metric::collect_statistics)
        .collect();
    reportable.sort_by(|a, b| a.name().cmp(b.name()));
    reportable
}

fn kind_mismatch(name: &MetricName, expected: &'static str, actual: &Metric) -> MetricsError {
    MetricsError::KindMismatch {
        name: name.simple_name().to_string(),
        expected,
        actual: actual.kind(),
    }
}

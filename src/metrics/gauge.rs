//! Gauges read on demand from caller-supplied sources.
//!
//! A gauge is either raw (reports the source value) or incrementing (reports
//! the change since the previous collection, for monotonically growing
//! sources such as cumulative GC counts). The mode is a flag on one wrapper
//! type rather than a separate type per variant.

use crate::core::Result;
use crate::metrics::metric::{Collectable, MetricVisitor};
use crate::metrics::name::MetricName;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Source of an integer gauge value.
pub trait GaugeLong: Send + Sync {
    fn value(&self) -> i64;
}

impl<F> GaugeLong for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn value(&self) -> i64 {
        self()
    }
}

/// Source of a floating point gauge value.
pub trait GaugeDouble: Send + Sync {
    fn value(&self) -> f64;
}

impl<F> GaugeDouble for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn value(&self) -> f64 {
        self()
    }
}

/// How a gauge turns source readings into reported values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMode {
    /// Report the source value when non-zero and changed since the last report.
    Raw,
    /// Report `current - previous` when non-zero.
    Incrementing,
}

/// Integer gauge over a [`GaugeLong`] source.
pub struct GaugeLongMetric {
    name: MetricName,
    source: Box<dyn GaugeLong>,
    mode: GaugeMode,
    /// Last source reading (incrementing mode)
    last_seen: AtomicI64,
    last_reported: AtomicI64,
    collected: AtomicI64,
    reportable: AtomicBool,
}

impl GaugeLongMetric {
    pub fn new(name: MetricName, source: impl GaugeLong + 'static) -> Self {
        Self::with_mode(name, source, GaugeMode::Raw)
    }

    pub fn incrementing(name: MetricName, source: impl GaugeLong + 'static) -> Self {
        Self::with_mode(name, source, GaugeMode::Incrementing)
    }

    /// The incrementing baseline is the source value at construction.
    pub fn with_mode(name: MetricName, source: impl GaugeLong + 'static, mode: GaugeMode) -> Self {
        let initial = match mode {
            GaugeMode::Raw => 0,
            GaugeMode::Incrementing => source.value(),
        };
        Self {
            name,
            source: Box::new(source),
            mode,
            last_seen: AtomicI64::new(initial),
            last_reported: AtomicI64::new(0),
            collected: AtomicI64::new(0),
            reportable: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> GaugeMode {
        self.mode
    }

    /// Current reading of the underlying source.
    pub fn source_value(&self) -> i64 {
        self.source.value()
    }

    /// Value captured by the last `collect_statistics`.
    pub fn collected_value(&self) -> i64 {
        self.collected.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for GaugeLongMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeLongMetric")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("collected", &self.collected)
            .finish()
    }
}

impl Collectable for GaugeLongMetric {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        let current = self.source.value();
        let (value, reportable) = match self.mode {
            GaugeMode::Raw => {
                let previous = self.last_reported.load(Ordering::Relaxed);
                let reportable = current != 0 && current != previous;
                if reportable {
                    self.last_reported.store(current, Ordering::Relaxed);
                }
                (current, reportable)
            }
            GaugeMode::Incrementing => {
                let previous = self.last_seen.swap(current, Ordering::AcqRel);
                let delta = current - previous;
                (delta, delta != 0)
            }
        };
        self.collected.store(value, Ordering::Release);
        self.reportable.store(reportable, Ordering::Release);
        reportable
    }

    fn clear_statistics(&self) {
        self.reportable.store(false, Ordering::Release);
        if self.mode == GaugeMode::Incrementing {
            self.last_seen.store(self.source.value(), Ordering::Release);
        }
    }

    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        if self.reportable.load(Ordering::Acquire) {
            visitor.visit_gauge_long(&self.name, self.collected_value())
        } else {
            Ok(())
        }
    }
}

/// Floating point gauge over a [`GaugeDouble`] source.
///
/// Values are held as raw `f64` bits in atomics.
pub struct GaugeDoubleMetric {
    name: MetricName,
    source: Box<dyn GaugeDouble>,
    mode: GaugeMode,
    last_seen: AtomicU64,
    last_reported: AtomicU64,
    collected: AtomicU64,
    reportable: AtomicBool,
}

impl GaugeDoubleMetric {
    pub fn new(name: MetricName, source: impl GaugeDouble + 'static) -> Self {
        Self::with_mode(name, source, GaugeMode::Raw)
    }

    pub fn incrementing(name: MetricName, source: impl GaugeDouble + 'static) -> Self {
        Self::with_mode(name, source, GaugeMode::Incrementing)
    }

    pub fn with_mode(
        name: MetricName,
        source: impl GaugeDouble + 'static,
        mode: GaugeMode,
    ) -> Self {
        let initial = match mode {
            GaugeMode::Raw => 0.0,
            GaugeMode::Incrementing => source.value(),
        };
        Self {
            name,
            source: Box::new(source),
            mode,
            last_seen: AtomicU64::new(initial.to_bits()),
            last_reported: AtomicU64::new(0f64.to_bits()),
            collected: AtomicU64::new(0f64.to_bits()),
            reportable: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> GaugeMode {
        self.mode
    }

    pub fn source_value(&self) -> f64 {
        self.source.value()
    }

    /// Value captured by the last `collect_statistics`.
    pub fn collected_value(&self) -> f64 {
        f64::from_bits(self.collected.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for GaugeDoubleMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeDoubleMetric")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("collected", &self.collected_value())
            .finish()
    }
}

impl Collectable for GaugeDoubleMetric {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        let current = self.source.value();
        let (value, reportable) = match self.mode {
            GaugeMode::Raw => {
                let previous = f64::from_bits(self.last_reported.load(Ordering::Relaxed));
                let reportable = current != 0.0 && current != previous;
                if reportable {
                    self.last_reported.store(current.to_bits(), Ordering::Relaxed);
                }
                (current, reportable)
            }
            GaugeMode::Incrementing => {
                let previous = f64::from_bits(self.last_seen.swap(current.to_bits(), Ordering::AcqRel));
                let delta = current - previous;
                (delta, delta != 0.0)
            }
        };
        self.collected.store(value.to_bits(), Ordering::Release);
        self.reportable.store(reportable, Ordering::Release);
        reportable
    }

    fn clear_statistics(&self) {
        self.reportable.store(false, Ordering::Release);
        if self.mode == GaugeMode::Incrementing {
            self.last_seen
                .store(self.source.value().to_bits(), Ordering::Release);
        }
    }

    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        if self.reportable.load(Ordering::Acquire) {
            visitor.visit_gauge_double(&self.name, self.collected_value())
        } else {
            Ok(())
        }
    }
}

/// A family of double gauges sharing a base name, e.g. `jvm.memory.heap`
/// with `init`, `used`, `committed`, `max` and `pct` members.
///
/// Reportable when any member is; only reportable members are visited.
#[derive(Debug)]
pub struct GaugeGroup {
    name: MetricName,
    gauges: Vec<GaugeDoubleMetric>,
}

impl GaugeGroup {
    pub fn new(base: MetricName) -> Self {
        Self {
            name: base,
            gauges: Vec::new(),
        }
    }

    /// Add a raw member named `<base>.<name>`.
    pub fn with_gauge(mut self, name: &str, source: impl GaugeDouble + 'static) -> Self {
        let member = self.name.with_suffix(name);
        self.gauges.push(GaugeDoubleMetric::new(member, source));
        self
    }

    /// Add an incrementing member named `<base>.<name>`.
    pub fn with_incrementing(mut self, name: &str, source: impl GaugeDouble + 'static) -> Self {
        let member = self.name.with_suffix(name);
        self.gauges.push(GaugeDoubleMetric::incrementing(member, source));
        self
    }

    pub fn gauges(&self) -> &[GaugeDoubleMetric] {
        &self.gauges
    }
}

impl Collectable for GaugeGroup {
    fn name(&self) -> &MetricName {
        &self.name
    }

    fn collect_statistics(&self) -> bool {
        // No short-circuit: every member must take its reading.
        self.gauges
            .iter()
            .fold(false, |any, gauge| gauge.collect_statistics() || any)
    }

    fn clear_statistics(&self) {
        for gauge in &self.gauges {
            gauge.clear_statistics();
        }
    }

    fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        for gauge in &self.gauges {
            gauge.visit(visitor)?;
        }
        Ok(())
    }
}

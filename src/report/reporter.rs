//! Reporter interface and the per-cycle snapshot handed to it.

use crate::core::Result;
use crate::metrics::{Metric, MetricVisitor};
use crate::timing::RequestTiming;
use chrono::{DateTime, Utc};

/// Sink consuming one report cycle's collected data.
///
/// Errors and panics are isolated per reporter by the scheduler; a failing
/// reporter never stops another reporter or later cycles.
pub trait MetricReporter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn report(&self, metrics: &ReportMetrics) -> Result<()>;

    /// Bounded-retention maintenance, called every few hours.
    fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

/// Data collected in one report cycle.
#[derive(Debug, Clone)]
pub struct ReportMetrics {
    /// Platform metrics first, then application metrics, each sorted by name
    metrics: Vec<Metric>,
    request_timings: Vec<RequestTiming>,
    collected_at: DateTime<Utc>,
}

impl ReportMetrics {
    pub fn new(
        metrics: Vec<Metric>,
        request_timings: Vec<RequestTiming>,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metrics,
            request_timings,
            collected_at,
        }
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn request_timings(&self) -> &[RequestTiming] {
        &self.request_timings
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.request_timings.is_empty()
    }

    /// Walk every metric's collected statistics in report order.
    pub fn visit(&self, visitor: &mut dyn MetricVisitor) -> Result<()> {
        for metric in &self.metrics {
            metric.visit(visitor)?;
        }
        Ok(())
    }
}

//! Reporter writing each collected metric to the log.

use crate::core::Result;
use crate::metrics::timed::ERROR_SUFFIX;
use crate::metrics::{CounterStatistics, MetricName, MetricVisitor, TimedStatistics, ValueStatistics};
use crate::report::timing_writer::RequestTimingWriter;
use crate::report::{MetricReporter, ReportMetrics};
use serde_json::json;
use tracing::info;

const TARGET: &str = "metron::report";

/// [`MetricReporter`] emitting one `tracing` event per reported series.
///
/// Lines are compact `key=value` pairs, or one JSON object per line when
/// `structured` is set. Request timings are rendered with a
/// [`RequestTimingWriter`].
#[derive(Debug, Clone)]
pub struct LogReporter {
    structured: bool,
    timing_writer: RequestTimingWriter,
}

impl LogReporter {
    pub fn new(structured: bool) -> Self {
        Self {
            structured,
            timing_writer: RequestTimingWriter::default(),
        }
    }

    pub fn with_timing_writer(mut self, writer: RequestTimingWriter) -> Self {
        self.timing_writer = writer;
        self
    }

    /// Render the metric lines for a snapshot without logging them.
    pub fn format_metrics(&self, metrics: &ReportMetrics) -> Result<Vec<String>> {
        let mut formatter = LineFormatter {
            structured: self.structured,
            lines: Vec::with_capacity(metrics.metrics().len()),
        };
        metrics.visit(&mut formatter)?;
        Ok(formatter.lines)
    }

    /// Render the request timings for a snapshot.
    pub fn format_request_timings(&self, metrics: &ReportMetrics) -> Result<String> {
        let mut buffer = Vec::new();
        self.timing_writer
            .write(&mut buffer, metrics.request_timings())?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MetricReporter for LogReporter {
    fn name(&self) -> &str {
        "log"
    }

    fn report(&self, metrics: &ReportMetrics) -> Result<()> {
        for line in self.format_metrics(metrics)? {
            info!(target: TARGET, "{}", line);
        }
        if !metrics.request_timings().is_empty() {
            let timings = self.format_request_timings(metrics)?;
            for line in timings.lines().filter(|line| !line.is_empty()) {
                info!(target: TARGET, "{}", line);
            }
        }
        Ok(())
    }
}

struct LineFormatter {
    structured: bool,
    lines: Vec<String>,
}

impl LineFormatter {
    fn push_value(&mut self, kind: &str, name: &MetricName, stats: &ValueStatistics, micros: bool) -> Result<()> {
        let scale = if micros { 1_000 } else { 1 };
        let line = if self.structured {
            serde_json::to_string(&json!({
                "type": kind,
                "name": name.simple_name(),
                "count": stats.count,
                "avg": stats.mean() / scale,
                "max": stats.max_or_zero() / scale,
                "total": stats.total / scale,
                "rate": stats.rate_per_second(),
            }))?
        } else {
            format!(
                "type={} name={} count={} avg={} max={} total={} rate={:.2}",
                kind,
                name,
                stats.count,
                stats.mean() / scale,
                stats.max_or_zero() / scale,
                stats.total / scale,
                stats.rate_per_second()
            )
        };
        self.lines.push(line);
        Ok(())
    }

    fn push_gauge(&mut self, name: &MetricName, value: serde_json::Value) -> Result<()> {
        let line = if self.structured {
            serde_json::to_string(&json!({
                "type": "gauge",
                "name": name.simple_name(),
                "value": value,
            }))?
        } else {
            format!("type=gauge name={} value={}", name, value)
        };
        self.lines.push(line);
        Ok(())
    }
}

impl MetricVisitor for LineFormatter {
    fn visit_counter(&mut self, name: &MetricName, stats: &CounterStatistics) -> Result<()> {
        let line = if self.structured {
            serde_json::to_string(&json!({
                "type": "counter",
                "name": name.simple_name(),
                "count": stats.count,
                "rate": stats.rate_per_second(),
            }))?
        } else {
            format!(
                "type=counter name={} count={} rate={:.2}",
                name,
                stats.count,
                stats.rate_per_second()
            )
        };
        self.lines.push(line);
        Ok(())
    }

    fn visit_value(&mut self, name: &MetricName, stats: &ValueStatistics) -> Result<()> {
        self.push_value("value", name, stats, false)
    }

    fn visit_timed(&mut self, name: &MetricName, stats: &TimedStatistics) -> Result<()> {
        // durations are logged in micros
        if !stats.success.is_empty() {
            self.push_value("timed", name, &stats.success, true)?;
        }
        if !stats.error.is_empty() {
            self.push_value("timed", &name.with_suffix(ERROR_SUFFIX), &stats.error, true)?;
        }
        Ok(())
    }

    fn visit_gauge_long(&mut self, name: &MetricName, value: i64) -> Result<()> {
        self.push_gauge(name, json!(value))
    }

    fn visit_gauge_double(&mut self, name: &MetricName, value: f64) -> Result<()> {
        self.push_gauge(name, json!(value))
    }
}

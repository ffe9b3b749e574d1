//! Text rendering of request timings.
//!
//! Each timing renders as a header line followed by one detail line per
//! section and a blank line:
//!
//! ```text
//! 14:02:11  exe:12ms  metric:app.web.handler  requestId:abc
//!    d:0    p:100  ms:12        us:12034        m:app.web.handler
//!    d:1    p:66   ms:8         us:8011            m:app.db.query
//! ```

use crate::core::Result;
use crate::timing::{RequestTiming, RequestTimingEntry};
use chrono::{TimeZone, Utc};
use std::io::Write;

/// Order of detail lines within one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimingOrder {
    /// Longest sections first
    #[default]
    TopContributor,
    /// Sections in the order they started
    StartBased,
}

/// Writes [`RequestTiming`]s as human-readable text.
#[derive(Debug, Clone, Default)]
pub struct RequestTimingWriter {
    threshold_percentage: i64,
    order: TimingOrder,
}

impl RequestTimingWriter {
    /// Skip detail lines below `threshold_percentage` of the request time.
    pub fn new(threshold_percentage: i64, order: TimingOrder) -> Self {
        Self {
            threshold_percentage,
            order,
        }
    }

    pub fn write<W: Write>(&self, out: &mut W, timings: &[RequestTiming]) -> Result<()> {
        for timing in timings {
            self.write_timing(out, timing)?;
        }
        Ok(())
    }

    fn write_timing<W: Write>(&self, out: &mut W, timing: &RequestTiming) -> Result<()> {
        let Some(top) = timing.top_entry() else {
            return Ok(());
        };
        let total_nanos = top.execution_nanos;

        let time = Utc
            .timestamp_millis_opt(timing.report_time())
            .single()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        write!(
            out,
            "{}  exe:{}ms  metric:{}",
            time,
            top.execution_millis(),
            top.metric_name
        )?;
        if let Some(request_id) = timing.external_request_id() {
            write!(out, "  requestId:{}", request_id)?;
        }
        writeln!(out)?;

        let entries = match self.order {
            TimingOrder::TopContributor => timing.entries_by_duration(),
            TimingOrder::StartBased => timing.entries_by_start(),
        };
        for entry in entries {
            let pct = percentage(total_nanos, entry.execution_nanos);
            if pct < self.threshold_percentage {
                continue;
            }
            write_detail(out, entry, pct)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

fn write_detail<W: Write>(out: &mut W, entry: &RequestTimingEntry, pct: i64) -> Result<()> {
    let indent = "   ".repeat(entry.depth as usize);
    writeln!(
        out,
        "   d:{:<2}   p:{:<3}  ms:{:<7}   us:{:<10}   {}m:{}",
        entry.depth,
        pct,
        entry.execution_millis(),
        entry.execution_micros(),
        indent,
        entry.metric_name
    )?;
    Ok(())
}

/// Share of `total_nanos` as a whole percentage, 0 when the total is 0.
pub fn percentage(total_nanos: i64, nanos: i64) -> i64 {
    if total_nanos == 0 {
        return 0;
    }
    nanos.saturating_mul(100) / total_nanos
}

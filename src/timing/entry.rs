//! Captured request timing data.

use crate::metrics::MetricName;
use serde::Serialize;

/// One completed timed section of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestTimingEntry {
    pub metric_name: MetricName,
    /// Nesting depth, 0 for the outermost section
    pub depth: u32,
    pub execution_nanos: i64,
    /// Order in which the section opened
    pub start_seq: u32,
    /// Order in which the section closed
    pub capture_seq: u32,
}

impl RequestTimingEntry {
    pub fn execution_micros(&self) -> i64 {
        self.execution_nanos / 1_000
    }

    pub fn execution_millis(&self) -> i64 {
        self.execution_nanos / 1_000_000
    }
}

/// The completed section tree of one logical request.
///
/// Entries are held in capture order: inner sections close before the
/// sections that contain them, so the outermost section is last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestTiming {
    entries: Vec<RequestTimingEntry>,
    /// Epoch millis at which the outermost section closed
    report_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_request_id: Option<String>,
}

impl RequestTiming {
    pub fn new(
        entries: Vec<RequestTimingEntry>,
        report_time: i64,
        external_request_id: Option<String>,
    ) -> Self {
        Self {
            entries,
            report_time,
            external_request_id,
        }
    }

    /// Entries in capture order.
    pub fn entries(&self) -> &[RequestTimingEntry] {
        &self.entries
    }

    pub fn report_time(&self) -> i64 {
        self.report_time
    }

    pub fn external_request_id(&self) -> Option<&str> {
        self.external_request_id.as_deref()
    }

    /// The outermost section, which spans the whole request.
    pub fn top_entry(&self) -> Option<&RequestTimingEntry> {
        self.entries
            .iter()
            .find(|entry| entry.depth == 0)
            .or_else(|| self.entries.iter().max_by_key(|entry| entry.execution_nanos))
    }

    /// Top contributors first: descending execution time, ties in start order.
    pub fn entries_by_duration(&self) -> Vec<&RequestTimingEntry> {
        let mut sorted: Vec<&RequestTimingEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            b.execution_nanos
                .cmp(&a.execution_nanos)
                .then(a.start_seq.cmp(&b.start_seq))
        });
        sorted
    }

    /// Chronological order of section starts, which reads as the call tree.
    pub fn entries_by_start(&self) -> Vec<&RequestTimingEntry> {
        let mut sorted: Vec<&RequestTimingEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|entry| entry.start_seq);
        sorted
    }
}

//! Periodic reporting of collected metrics.
//!
//! The [`ReportScheduler`] drives report cycles on a tokio timer and hands
//! each cycle's [`ReportMetrics`] to up to two [`MetricReporter`]s.

pub mod log_reporter;
pub mod reporter;
pub mod scheduler;
pub mod timing_writer;

pub use log_reporter::LogReporter;
pub use reporter::{MetricReporter, ReportMetrics};
pub use scheduler::{CycleSummary, ReportCycle, ReportScheduler};
pub use timing_writer::{RequestTimingWriter, TimingOrder};

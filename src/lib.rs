//! Metron - in-process metrics collection.
//!
//! Metron records counts, value distributions and timed durations under
//! stable names, captures per-request timing trees, and periodically hands
//! collected statistics to pluggable reporters.
//!
//! # Features
//!
//! - **Lock-free hot path**: counters, value accumulators and timers are plain atomics
//! - **Exactly-once creation**: racing first lookups of a name share one metric
//! - **Request timing trees**: nested sections per logical request, bounded buffering
//! - **Zero-cost disable**: a no-op factory chosen once at startup
//! - **Isolated reporters**: one failing reporter never stops another
//!
//! # Architecture
//!
//! - `metrics`: accumulators, gauges and the polymorphic [`Metric`]
//! - `timing`: per-request capture of nested timed sections
//! - `registry`: name-keyed cache with pluggable factories
//! - `report`: periodic scheduler and reporters
//! - `core`: configuration, errors, clocks and logging
//! - `cli`: demo workload driver
//!
//! # Example
//!
//! ```no_run
//! use metron::core::Config;
//! use metron::report::{LogReporter, MetricReporter, ReportScheduler};
//! use metron::MetricRegistry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let registry = Arc::new(MetricRegistry::new(&config)?);
//!
//!     let reporter: Arc<dyn MetricReporter> = Arc::new(LogReporter::default());
//!     let scheduler =
//!         ReportScheduler::start(Arc::clone(&registry), &config.reporting, Some(reporter), None)?;
//!
//!     let requests = registry.counter("app.web.requests")?;
//!     let query = registry.timed_metric("app.db.query")?;
//!
//!     requests.increment();
//!     let event = query.start_event();
//!     // ... run the query ...
//!     event.end_with_success();
//!
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod timing;

// Re-export core types for convenience
pub use crate::core::{Config, MetricsError, Result};
pub use crate::metrics::{Counter, Metric, MetricName, TimedMetric, ValueMetric};
pub use crate::registry::{MetricKind, MetricRegistry};
pub use crate::timing::{RequestContext, RequestTiming};

//! Lock-free metric accumulators.
//!
//! Hot-path targets:
//! - Counter increment and value add are a handful of relaxed atomics
//! - Bucket lookup is a binary search over at most a few bounds
//! - No locks and no allocation while recording
//!
//! Every accumulator is collected and reset once per report interval by the
//! single collector thread; writes racing with a collect may land in either
//! interval.

pub mod bucket;
pub mod counter;
pub mod factory;
pub mod gauge;
pub mod metric;
pub mod name;
pub mod timed;
pub mod value;

pub use bucket::{BucketTimedMetric, DefaultBucketTimedMetric, NoopBucketTimedMetric};
pub use counter::{Counter, CounterStatistics, DefaultCounter, NoopCounter};
pub use factory::{DefaultMetricFactory, MetricFactory, NoopMetricFactory};
pub use gauge::{GaugeDouble, GaugeDoubleMetric, GaugeGroup, GaugeLong, GaugeLongMetric, GaugeMode};
pub use metric::{Collectable, Metric, MetricVisitor};
pub use name::MetricName;
pub use timed::{DefaultTimedMetric, NoopTimedMetric, TimedEvent, TimedMetric, TimedRecorder, TimedStatistics};
pub use value::{DefaultValueMetric, NoopValueMetric, ValueCounter, ValueMetric, ValueStatistics, NO_SAMPLES};

//! Hierarchical timing of individual requests.
//!
//! Application code opens nested sections on a per-request
//! [`RequestContext`]; each completed request becomes one [`RequestTiming`]
//! buffered in a [`RequestTimingQueue`] until the next report cycle.

pub mod context;
pub mod entry;
pub mod queue;

pub use context::{ExternalRequestIdAdapter, RequestContext, TimedSection};
pub use entry::{RequestTiming, RequestTimingEntry};
pub use queue::RequestTimingQueue;

//! Per-request capture of nested timed sections.
//!
//! A [`RequestContext`] belongs to one logical request and is threaded
//! through the code handling it (it is `Send` but not `Sync`, so it can move
//! with an async task but never be shared between requests). Each
//! [`TimedSection`] pushes a frame on entry and records a
//! [`RequestTimingEntry`] when it closes. Closing the outermost section
//! assembles a [`RequestTiming`] and hands it to the registry's queue.

use crate::core::Clock;
use crate::metrics::{MetricName, TimedMetric};
use crate::timing::{RequestTiming, RequestTimingEntry, RequestTimingQueue};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::sync::Arc;

/// Supplies an identifier from an outer system (trace id, request header)
/// used to tag completed request timings.
pub trait ExternalRequestIdAdapter: Send + Sync {
    fn external_request_id(&self) -> Option<String>;
}

impl<F> ExternalRequestIdAdapter for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn external_request_id(&self) -> Option<String> {
        self()
    }
}

struct Frame {
    name: MetricName,
    start_nanos: i64,
    start_seq: u32,
}

#[derive(Default)]
struct CaptureState {
    frames: SmallVec<[Frame; 8]>,
    entries: Vec<RequestTimingEntry>,
    next_start_seq: u32,
    next_capture_seq: u32,
    /// Bumped each time a request is published; guards from earlier requests are ignored.
    generation: u64,
}

/// Position of an open section within its request.
#[derive(Clone, Copy)]
struct FrameRef {
    depth: usize,
    generation: u64,
}

/// Call-stack shaped timing capture for one logical request.
pub struct RequestContext {
    clock: Arc<dyn Clock>,
    /// None when collection is disabled; sections then record nothing.
    sink: Option<Arc<RequestTimingQueue>>,
    adapter: Option<Arc<dyn ExternalRequestIdAdapter>>,
    state: RefCell<CaptureState>,
}

impl RequestContext {
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Option<Arc<RequestTimingQueue>>,
        adapter: Option<Arc<dyn ExternalRequestIdAdapter>>,
    ) -> Self {
        Self {
            clock,
            sink,
            adapter,
            state: RefCell::new(CaptureState::default()),
        }
    }

    /// Open a section named `name`.
    pub fn enter(&self, name: MetricName) -> TimedSection<'_> {
        self.open(name, None)
    }

    /// Open a section that also records its duration on `metric`.
    pub fn time<'a>(&'a self, metric: &'a dyn TimedMetric) -> TimedSection<'a> {
        self.open(metric.name().clone(), Some(metric))
    }

    /// Number of currently open sections.
    pub fn depth(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn is_capturing(&self) -> bool {
        self.sink.is_some()
    }

    fn open<'a>(&'a self, name: MetricName, metric: Option<&'a dyn TimedMetric>) -> TimedSection<'a> {
        let start_nanos = self.clock.tick_nanos();
        let frame = if self.sink.is_some() {
            let mut state = self.state.borrow_mut();
            let depth = state.frames.len();
            let start_seq = state.next_start_seq;
            state.next_start_seq += 1;
            state.frames.push(Frame {
                name,
                start_nanos,
                start_seq,
            });
            Some(FrameRef {
                depth,
                generation: state.generation,
            })
        } else {
            None
        };

        TimedSection {
            context: self,
            metric,
            frame,
            start_nanos,
            finished: false,
        }
    }

    fn close(&self, frame: Option<FrameRef>, end_nanos: i64) {
        let (Some(FrameRef { depth, generation }), Some(sink)) = (frame, self.sink.as_ref()) else {
            return;
        };

        let mut state = self.state.borrow_mut();
        // Stale guard: its frame was already closed along with an outer section.
        if generation != state.generation || depth >= state.frames.len() {
            return;
        }
        // Frames above `depth` belong to sections that were leaked without closing.
        state.frames.truncate(depth + 1);
        let Some(frame) = state.frames.pop() else {
            return;
        };

        let capture_seq = state.next_capture_seq;
        state.next_capture_seq += 1;
        state.entries.push(RequestTimingEntry {
            metric_name: frame.name,
            depth: u32::try_from(depth).unwrap_or(u32::MAX),
            execution_nanos: (end_nanos - frame.start_nanos).max(0),
            start_seq: frame.start_seq,
            capture_seq,
        });

        if state.frames.is_empty() {
            let entries = std::mem::take(&mut state.entries);
            state.next_start_seq = 0;
            state.next_capture_seq = 0;
            state.generation += 1;
            drop(state);

            let external_request_id = self
                .adapter
                .as_ref()
                .and_then(|adapter| adapter.external_request_id());
            sink.push(RequestTiming::new(
                entries,
                self.clock.now_millis(),
                external_request_id,
            ));
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("depth", &self.depth())
            .field("capturing", &self.is_capturing())
            .finish()
    }
}

/// Guard for an open section of a [`RequestContext`].
///
/// Dropping the guard closes the section. When it wraps a timed metric, a
/// drop without [`end`](Self::end) records the event as an error.
#[must_use = "the section closes as soon as the guard is dropped"]
pub struct TimedSection<'a> {
    context: &'a RequestContext,
    metric: Option<&'a dyn TimedMetric>,
    frame: Option<FrameRef>,
    start_nanos: i64,
    finished: bool,
}

impl TimedSection<'_> {
    pub fn end_with_success(self) {
        self.end(true);
    }

    pub fn end_with_error(self) {
        self.end(false);
    }

    pub fn end(mut self, success: bool) {
        self.finish(success);
    }

    fn finish(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let end_nanos = self.context.clock.tick_nanos();
        if let Some(metric) = self.metric {
            metric.add_event_duration(success, (end_nanos - self.start_nanos).max(0));
        }
        self.context.close(self.frame, end_nanos);
    }
}

impl Drop for TimedSection<'_> {
    fn drop(&mut self) {
        self.finish(false);
    }
}

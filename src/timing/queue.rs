//! Buffer of completed request timings awaiting the next report cycle.

use crate::timing::RequestTiming;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Bounded multi-producer queue of [`RequestTiming`]s.
///
/// Producers never block: when the ring is full the oldest timing is
/// evicted to make room and counted as dropped.
pub struct RequestTimingQueue {
    timings: ArrayQueue<RequestTiming>,
    dropped: AtomicU64,
}

impl RequestTimingQueue {
    /// Create a queue holding at most `capacity` timings (`capacity` > 0).
    pub fn new(capacity: usize) -> Self {
        Self {
            timings: ArrayQueue::new(capacity.max(1)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a timing, evicting the oldest when full.
    pub fn push(&self, timing: RequestTiming) {
        if self.timings.force_push(timing).is_some() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // Log on 1, 2, 4, 8... to keep a saturated queue from flooding the log.
            if dropped.is_power_of_two() {
                warn!(
                    dropped,
                    capacity = self.timings.capacity(),
                    "Request timing queue full, dropping oldest timings"
                );
            }
        }
    }

    /// Remove and return everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<RequestTiming> {
        let mut timings = Vec::with_capacity(self.timings.len());
        while let Some(timing) = self.timings.pop() {
            timings.push(timing);
        }
        timings
    }

    /// Timings evicted since creation.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.timings.capacity()
    }
}

impl std::fmt::Debug for RequestTimingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTimingQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn timing(report_time: i64) -> RequestTiming {
        RequestTiming::new(Vec::new(), report_time, None)
    }

    #[test]
    fn test_drain_in_fifo_order() {
        let queue = RequestTimingQueue::new(8);
        queue.push(timing(1));
        queue.push(timing(2));
        queue.push(timing(3));

        let drained: Vec<i64> = queue.drain().iter().map(RequestTiming::report_time).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let queue = RequestTimingQueue::new(2);
        queue.push(timing(1));
        queue.push(timing(2));
        queue.push(timing(3));

        assert_eq!(queue.dropped_count(), 1);
        let drained: Vec<i64> = queue.drain().iter().map(RequestTiming::report_time).collect();
        assert_eq!(drained, vec![2, 3]);
    }

    #[test]
    fn test_concurrent_producers() {
        use std::thread;

        let queue = Arc::new(RequestTimingQueue::new(10_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..1_000 {
                        queue.push(timing(t * 1_000 + i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.drain().len(), 4_000);
        assert_eq!(queue.dropped_count(), 0);
    }
}

//! Time sources for timed metrics and request capture.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Process-wide origin for monotonic ticks.
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// An abstraction for how time passes.
pub trait Clock: Send + Sync {
    /// Current time tick in nanoseconds. Only differences between ticks are meaningful.
    fn tick_nanos(&self) -> i64;

    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock backed by `Instant`, relative to the first use in this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn tick_nanos(&self) -> i64 {
        i64::try_from(EPOCH.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Manually advanced clock for deterministic tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the tick by `nanos`.
    pub fn advance(&self, nanos: i64) {
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Set the wall-clock time reported by `now_millis`.
    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn tick_nanos(&self) -> i64 {
        self.nanos.load(Ordering::Relaxed)
    }

    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::Relaxed)
    }
}

//! Periodic collection and dispatch to reporters.
//!
//! Each cycle moves `Idle -> Collecting -> Dispatching -> Idle`: collect
//! platform and application metrics plus buffered request timings, then hand
//! one snapshot to the local and remote reporters. Every
//! `cleanup_every_ticks` cycles the reporters' cleanup hooks run as well.

use crate::core::config::ReportingConfig;
use crate::core::{MetricsError, Result};
use crate::registry::MetricRegistry;
use crate::report::{MetricReporter, ReportMetrics};
use chrono::Utc;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, trace};

/// Outcome of one report cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub metrics: usize,
    pub request_timings: usize,
    pub reporter_failures: usize,
    pub cleaned_up: bool,
}

/// One collect-and-dispatch pass, shared by the timer task and on-demand callers.
///
/// Cycles never overlap: a metric keeps its collected statistics until the
/// next collection, so a second collect racing a dispatch would replace the
/// snapshot a reporter is about to read.
pub struct ReportCycle {
    registry: Arc<MetricRegistry>,
    /// Held from collection through cleanup.
    running: Mutex<()>,
    local: Option<Arc<dyn MetricReporter>>,
    remote: Option<Arc<dyn MetricReporter>>,
    ticks: AtomicU64,
    cleanup_every_ticks: u64,
}

impl ReportCycle {
    pub fn new(
        registry: Arc<MetricRegistry>,
        config: &ReportingConfig,
        local: Option<Arc<dyn MetricReporter>>,
        remote: Option<Arc<dyn MetricReporter>>,
    ) -> Self {
        Self {
            registry,
            running: Mutex::new(()),
            local,
            remote,
            ticks: AtomicU64::new(0),
            cleanup_every_ticks: config.cleanup_every_ticks(),
        }
    }

    /// Collect, dispatch and, when due, clean up.
    ///
    /// Blocks while another cycle is in progress.
    pub fn run(&self) -> CycleSummary {
        let _running = self.running.lock();
        let mut metrics = self.registry.collect_non_empty_platform_metrics();
        metrics.extend(self.registry.collect_non_empty_metrics());
        let request_timings = self.registry.collect_request_timings();

        let snapshot = ReportMetrics::new(metrics, request_timings, Utc::now());
        let mut summary = CycleSummary {
            metrics: snapshot.metrics().len(),
            request_timings: snapshot.request_timings().len(),
            ..CycleSummary::default()
        };
        trace!(
            metrics = summary.metrics,
            request_timings = summary.request_timings,
            "Dispatching report cycle"
        );

        for reporter in self.reporters() {
            if !isolate(reporter.name(), "report", || reporter.report(&snapshot)) {
                summary.reporter_failures += 1;
            }
        }

        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if tick % self.cleanup_every_ticks == 0 {
            summary.cleaned_up = true;
            for reporter in self.reporters() {
                if !isolate(reporter.name(), "cleanup", || reporter.cleanup()) {
                    summary.reporter_failures += 1;
                }
            }
        }

        summary
    }

    /// Cycles run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    fn reporters(&self) -> impl Iterator<Item = &Arc<dyn MetricReporter>> {
        self.local.iter().chain(self.remote.iter())
    }
}

/// Run one reporter call, logging and swallowing errors and panics.
fn isolate(reporter: &str, operation: &str, call: impl FnOnce() -> Result<()>) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(
                reporter,
                operation,
                category = e.category(),
                "Reporter failed: {}",
                e
            );
            false
        }
        Err(_) => {
            error!(reporter, operation, "Reporter panicked");
            false
        }
    }
}

/// Background timer driving [`ReportCycle`]s on a tokio runtime.
pub struct ReportScheduler {
    cycle: Arc<ReportCycle>,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ReportScheduler {
    /// Spawn the timer task. The first cycle runs one interval after start.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        registry: Arc<MetricRegistry>,
        config: &ReportingConfig,
        local: Option<Arc<dyn MetricReporter>>,
        remote: Option<Arc<dyn MetricReporter>>,
    ) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(MetricsError::InvalidInterval);
        }

        let cycle = Arc::new(ReportCycle::new(registry, config, local, remote));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = config.interval;

        let task_cycle = Arc::clone(&cycle);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cycle = Arc::clone(&task_cycle);
                        // Reporters may block on I/O; keep them off the async workers.
                        if let Err(e) = tokio::task::spawn_blocking(move || cycle.run()).await {
                            error!("Report cycle task failed: {}", e);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Report scheduler stopped");
        });

        info!(
            interval = ?config.interval,
            cleanup_every_ticks = cycle.cleanup_every_ticks,
            "Report scheduler started"
        );

        Ok(Self {
            cycle,
            shutdown_tx,
            handle: Some(handle),
        })
    }

    /// Run one cycle immediately on the calling thread.
    pub fn run_cycle(&self) -> CycleSummary {
        self.cycle.run()
    }

    /// Cycles run so far, timer-driven and on-demand.
    pub fn ticks(&self) -> u64 {
        self.cycle.ticks()
    }

    /// Signal the timer task to stop after any in-flight cycle.
    ///
    /// Data recorded but not yet collected is discarded.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop and wait for the timer task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Report scheduler task failed: {}", e);
            }
        }
    }
}

impl Drop for ReportScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

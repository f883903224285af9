//! Snapshot directory watching.
//!
//! The ingestion job drops a new `<region>.json` into the data directory every
//! few minutes. [`SnapshotWatcher`] rescans the directory on an interval and
//! swaps changed files into the store, then logs how many alerts each region
//! now has.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::query::FlightQueryService;
use crate::store::{ReloadReport, SnapshotStore};

/// A handle to stop a running watcher.
///
/// This is a lightweight, cloneable handle that can be used to control the
/// watcher from other tasks, such as a signal handler.
#[derive(Debug, Clone, Default)]
pub struct WatchHandle {
    stop_signal: Arc<AtomicBool>,
    wake: Arc<Notify>,
    passes: Arc<AtomicU64>,
}

impl WatchHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the watcher to stop. A watcher waiting for its next tick
    /// returns at once; one in the middle of a pass finishes the pass first.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        // Stores a permit if the watcher is not waiting yet.
        self.wake.notify_one();
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    /// Number of completed reload passes.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }
}

/// Periodically reloads the store from its data directory.
#[derive(Debug)]
pub struct SnapshotWatcher {
    store: Arc<SnapshotStore>,
    queries: FlightQueryService,
    interval: Duration,
    handle: WatchHandle,
}

impl SnapshotWatcher {
    /// Create a watcher over `store`, which should have a data directory.
    #[must_use]
    pub fn new(store: Arc<SnapshotStore>, interval: Duration) -> Self {
        let queries = FlightQueryService::new(store.clone());
        Self {
            store,
            queries,
            interval,
            handle: WatchHandle::new(),
        }
    }

    /// A handle that stops this watcher.
    #[must_use]
    pub fn handle(&self) -> WatchHandle {
        self.handle.clone()
    }

    /// Run one reload pass and log alert counts for changed regions.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be listed.
    pub async fn poll_once(&self) -> Result<ReloadReport> {
        let report = self.store.reload_all()?;
        self.handle.passes.fetch_add(1, Ordering::SeqCst);

        if report.loaded == 0 {
            debug!(unchanged = report.unchanged, rejected = report.rejected, "No new snapshots");
            return Ok(report);
        }

        for region in self.store.regions() {
            match self.queries.list_active_alerts(&region).await {
                Ok(alerts) if !alerts.flights.is_empty() => {
                    warn!(region = %region, alerts = alerts.flights.len(), "Active alerts");
                }
                Ok(_) => debug!(region = %region, "No active alerts"),
                Err(e) => warn!(region = %region, error = %e, "Failed to count alerts"),
            }
        }

        info!(
            loaded = report.loaded,
            unchanged = report.unchanged,
            rejected = report.rejected,
            "Snapshots reloaded"
        );
        Ok(report)
    }

    /// Poll until the handle is stopped.
    ///
    /// A pass that fails is logged and the watcher keeps going.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "Watching snapshot directory");
        while !self.handle.should_stop() {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.handle.wake.notified() => break,
            }
            if self.handle.should_stop() {
                break;
            }
            if let Err(e) = self.poll_once().await {
                warn!(error = %e, "Snapshot reload failed");
            }
        }
        info!(passes = self.handle.passes(), "Snapshot watcher stopped");
    }
}

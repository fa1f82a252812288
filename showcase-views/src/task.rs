//! View Tracker Background Task
//!
//! Drives a [`ViewTracker`] on two timers:
//!
//! - every `flush_interval`, deliver pending views
//! - every `persist_interval`, save pending views for recovery
//!
//! On shutdown the task runs a final flush and save before exiting.
//!
//! ```ignore
//! let tracker = ViewTracker::from_config(ViewTrackingConfig::from_env())?;
//! let handle = spawn_tracker_task(tracker.clone())?;
//!
//! tracker.track_view(work_id);
//!
//! // Later
//! handle.shutdown().await;
//! ```

use showcase_core::ConfigError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::tracker::{FlushOutcome, ViewTracker};

/// Handle to a running tracker task.
#[derive(Debug)]
pub struct TrackerHandle {
    tracker: ViewTracker,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TrackerHandle {
    pub fn tracker(&self) -> &ViewTracker {
        &self.tracker
    }

    /// Stop the timers, then flush and save one last time.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "view tracker task ended abnormally");
        }
    }
}

/// Recover saved views, then spawn the flush/persist loop.
///
/// Fails without spawning when the tracker's configuration is invalid.
/// Must be called from within a tokio runtime.
pub fn spawn_tracker_task(tracker: ViewTracker) -> Result<TrackerHandle, ConfigError> {
    tracker.config().validate()?;
    tracker.recover();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let join = tokio::spawn(tracker_task(tracker.clone(), shutdown_rx));
    Ok(TrackerHandle {
        tracker,
        shutdown_tx,
        join,
    })
}

/// Timer loop. Runs until the shutdown signal is received.
pub async fn tracker_task(tracker: ViewTracker, mut shutdown_rx: watch::Receiver<bool>) {
    if let Err(e) = tracker.config().validate() {
        tracing::error!(error = %e, "View tracker task not started");
        return;
    }

    let flush_every = tracker.config().flush_interval;
    let persist_every = tracker.config().persist_interval;

    // First ticks are one period out; an immediate persist tick would wipe a
    // saved queue before anything was tracked.
    let mut flush_interval = interval_at(Instant::now() + flush_every, flush_every);
    flush_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut persist_interval = interval_at(Instant::now() + persist_every, persist_every);
    persist_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        flush_interval_ms = flush_every.as_millis() as u64,
        persist_interval_ms = persist_every.as_millis() as u64,
        batch_size = tracker.config().batch_size,
        "View tracker task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            _ = flush_interval.tick() => {
                if let FlushOutcome::Requeued { count, .. } = tracker.flush().await {
                    tracing::debug!(count, "periodic flush requeued");
                }
            }

            _ = persist_interval.tick() => {
                if let Err(e) = tracker.persist() {
                    tracing::warn!(error = %e, "could not save pending views");
                }
            }
        }
    }

    let outcome = tracker.on_unload().await;
    let stats = tracker.stats();
    tracing::info!(
        final_flush = ?outcome,
        flushes = stats.flushes,
        delivered_ids = stats.delivered_ids,
        failed_flushes = stats.failed_flushes,
        "View tracker task stopped"
    );
}

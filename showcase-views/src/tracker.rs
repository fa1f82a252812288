//! Client-side view-count batching.
//!
//! [`ViewTracker`] records each work id once per session and delivers the
//! pending ids in batches. A flush takes the whole pending queue under the
//! lock before the delivery starts, so views tracked during an in-flight
//! flush land in the next batch. Reaching the batch size takes the batch in
//! the same critical section that queued the last id, so a burst of views
//! produces batches of at most `batch_size` ids. A failed delivery puts its
//! batch back at the front of the queue; the seen set is never rolled back.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use showcase_core::{ConfigError, DeliveryError, PersistError, WorkId};
use tokio::task::JoinHandle;

use crate::config::ViewTrackingConfig;
use crate::persist::{FilePendingStore, PendingStore};
use crate::transport::TransportSelector;

/// Result of [`ViewTracker::track_view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Already seen this session; nothing changed.
    Duplicate,
    /// Added to the pending queue.
    Queued { pending: usize },
    /// Added, and the queue reached the batch size so a flush was started.
    FlushScheduled { pending: usize },
}

/// Result of [`ViewTracker::flush`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Empty,
    /// The batch was handed to a transport.
    Delivered { count: usize, transport: &'static str },
    /// Delivery failed; the batch is back at the front of the queue.
    Requeued { count: usize, error: DeliveryError },
}

impl FlushOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, FlushOutcome::Delivered { .. })
    }
}

/// Snapshot of tracker activity since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub flushes: u64,
    pub delivered_ids: u64,
    pub failed_flushes: u64,
}

#[derive(Debug, Default)]
struct TrackerCounters {
    flushes: AtomicU64,
    delivered_ids: AtomicU64,
    failed_flushes: AtomicU64,
}

#[derive(Debug, Default)]
struct TrackerState {
    seen: HashSet<WorkId>,
    pending: VecDeque<WorkId>,
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    config: ViewTrackingConfig,
    transports: TransportSelector,
    store: Option<Arc<dyn PendingStore>>,
    counters: TrackerCounters,
    /// Deliveries spawned by `track_view` at the batch threshold.
    spawned: Mutex<Vec<JoinHandle<()>>>,
}

impl TrackerInner {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Which transports a batch may go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// First available transport, fire-and-forget included.
    Any,
    /// Only transports that wait for the server's answer.
    Confirmed,
}

/// Session-scoped view batching queue. Clones share state.
#[derive(Clone)]
pub struct ViewTracker {
    inner: Arc<TrackerInner>,
}

impl std::fmt::Debug for ViewTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewTracker")
            .field("viewed", &self.viewed_count())
            .field("pending", &self.pending_count())
            .field("transports", &self.inner.transports)
            .finish()
    }
}

impl ViewTracker {
    /// Tracker without persistence.
    pub fn new(config: ViewTrackingConfig, transports: TransportSelector) -> Self {
        Self::build(config, transports, None)
    }

    /// Tracker whose pending queue is saved to and recovered from `store`.
    pub fn with_store(
        config: ViewTrackingConfig,
        transports: TransportSelector,
        store: Arc<dyn PendingStore>,
    ) -> Self {
        Self::build(config, transports, Some(store))
    }

    fn build(
        config: ViewTrackingConfig,
        transports: TransportSelector,
        store: Option<Arc<dyn PendingStore>>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState::default()),
                config,
                transports,
                store,
                counters: TrackerCounters::default(),
                spawned: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build a tracker with the standard transports and, when a storage
    /// directory is configured, a file-backed pending store.
    pub fn from_config(config: ViewTrackingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transports = TransportSelector::standard(&config);
        Ok(match config.storage_dir.clone() {
            Some(dir) => {
                Self::with_store(config, transports, Arc::new(FilePendingStore::new(dir)))
            }
            None => Self::new(config, transports),
        })
    }

    pub fn config(&self) -> &ViewTrackingConfig {
        &self.inner.config
    }

    // ========================================================================
    // TRACKING
    // ========================================================================

    /// Record a view of `work_id`.
    ///
    /// Reaching the batch size takes the pending queue as a batch and spawns
    /// its delivery on the current runtime without waiting for it. Outside a
    /// runtime the ids simply stay pending.
    pub fn track_view(&self, work_id: impl Into<WorkId>) -> TrackOutcome {
        let work_id = work_id.into();
        let runtime = tokio::runtime::Handle::try_current().ok();

        let (pending, batch, runtime) = {
            let mut state = self.inner.lock();
            if !state.seen.insert(work_id.clone()) {
                return TrackOutcome::Duplicate;
            }
            state.pending.push_back(work_id);
            let pending = state.pending.len();
            if pending < self.inner.config.batch_size {
                return TrackOutcome::Queued { pending };
            }
            let Some(runtime) = runtime else {
                tracing::debug!(pending, "batch size reached outside a runtime, deferring flush");
                return TrackOutcome::Queued { pending };
            };
            (pending, state.pending.drain(..).collect::<Vec<_>>(), runtime)
        };

        let tracker = self.clone();
        let delivery = runtime.spawn(async move {
            tracker.deliver(batch, Route::Any).await;
        });
        let mut spawned = self.inner.spawned.lock().unwrap_or_else(PoisonError::into_inner);
        spawned.retain(|h| !h.is_finished());
        spawned.push(delivery);
        TrackOutcome::FlushScheduled { pending }
    }

    /// Deliver everything pending.
    pub async fn flush(&self) -> FlushOutcome {
        match self.take_batch() {
            Some(batch) => self.deliver(batch, Route::Any).await,
            None => FlushOutcome::Empty,
        }
    }

    /// Empty the pending queue into a batch, if anything is pending.
    fn take_batch(&self) -> Option<Vec<WorkId>> {
        let mut state = self.inner.lock();
        if state.pending.is_empty() {
            return None;
        }
        Some(state.pending.drain(..).collect())
    }

    /// Send an owned batch; on failure put it back at the front of the queue.
    async fn deliver(&self, batch: Vec<WorkId>, route: Route) -> FlushOutcome {
        let count = batch.len();
        self.inner.counters.flushes.fetch_add(1, Ordering::Relaxed);

        let delivered = match route {
            Route::Any => self.inner.transports.deliver(&batch).await,
            Route::Confirmed => self.inner.transports.deliver_confirmed(&batch).await,
        };

        match delivered {
            Ok(transport) => {
                self.inner
                    .counters
                    .delivered_ids
                    .fetch_add(count as u64, Ordering::Relaxed);
                tracing::debug!(count, transport, "view batch delivered");
                FlushOutcome::Delivered { count, transport }
            }
            Err(error) => {
                self.inner.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(count, error = %error, "view batch delivery failed, requeueing");
                let mut state = self.inner.lock();
                for id in batch.into_iter().rev() {
                    state.pending.push_front(id);
                }
                FlushOutcome::Requeued { count, error }
            }
        }
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Pull ids saved by a previous session into the queue, then clear the
    /// saved copy. Recovered ids go ahead of anything already pending and
    /// count as seen. Returns the number of ids added.
    pub fn recover(&self) -> usize {
        let Some(store) = &self.inner.store else {
            return 0;
        };

        let loaded = match store.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(error = %e, "could not read saved pending views");
                None
            }
        };

        let added = match loaded {
            Some(ids) => {
                let mut state = self.inner.lock();
                let mut recovered = VecDeque::with_capacity(ids.len());
                for id in ids {
                    if state.pending.contains(&id) || recovered.contains(&id) {
                        continue;
                    }
                    state.seen.insert(id.clone());
                    recovered.push_back(id);
                }
                let added = recovered.len();
                recovered.append(&mut state.pending);
                state.pending = recovered;
                added
            }
            None => 0,
        };

        if let Err(e) = store.clear() {
            tracing::warn!(error = %e, "could not clear saved pending views");
        }
        if added > 0 {
            tracing::info!(recovered = added, "recovered pending views");
        }
        added
    }

    /// Save the pending queue, or clear the saved copy when nothing is
    /// pending. Returns the number of ids saved.
    pub fn persist(&self) -> Result<usize, PersistError> {
        let Some(store) = &self.inner.store else {
            return Ok(0);
        };
        let snapshot = self.pending_snapshot();
        if snapshot.is_empty() {
            store.clear()?;
        } else {
            store.save(&snapshot)?;
        }
        Ok(snapshot.len())
    }

    /// Final delivery before the process goes away.
    ///
    /// Waits for deliveries still in flight, then sends the
    /// pending queue through a transport that waits for the server's answer.
    /// Whatever the server did not accept is saved for the next session.
    pub async fn on_unload(&self) -> FlushOutcome {
        let spawned =
            std::mem::take(&mut *self.inner.spawned.lock().unwrap_or_else(PoisonError::into_inner));
        for delivery in spawned {
            if let Err(e) = delivery.await {
                tracing::debug!(error = %e, "threshold delivery did not finish");
            }
        }
        self.inner.transports.settle().await;
        let outcome = match self.take_batch() {
            Some(batch) => self.deliver(batch, Route::Confirmed).await,
            None => FlushOutcome::Empty,
        };
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "could not save pending views on unload");
        }
        outcome
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Distinct ids seen this session.
    pub fn viewed_count(&self) -> usize {
        self.inner.lock().seen.len()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Pending ids in delivery order.
    pub fn pending_snapshot(&self) -> Vec<WorkId> {
        self.inner.lock().pending.iter().cloned().collect()
    }

    pub fn has_seen(&self, work_id: &str) -> bool {
        self.inner.lock().seen.contains(work_id)
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            flushes: self.inner.counters.flushes.load(Ordering::Relaxed),
            delivered_ids: self.inner.counters.delivered_ids.load(Ordering::Relaxed),
            failed_flushes: self.inner.counters.failed_flushes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryPendingStore;
    use crate::transport::ViewTransport;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct Capture {
        batches: Mutex<Vec<Vec<WorkId>>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ViewTransport for Arc<Capture> {
        fn name(&self) -> &'static str {
            "capture"
        }
        fn is_available(&self) -> bool {
            true
        }
        async fn send(&self, ids: &[WorkId]) -> Result<(), DeliveryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeliveryError::Rejected { status: 503 });
            }
            self.batches.lock().unwrap().push(ids.to_vec());
            Ok(())
        }
    }

    fn tracker(batch_size: usize) -> (ViewTracker, Arc<Capture>) {
        let capture = Arc::new(Capture::default());
        let tracker = ViewTracker::new(
            ViewTrackingConfig::default().with_batch_size(batch_size),
            TransportSelector::new().with(capture.clone()),
        );
        (tracker, capture)
    }

    fn stored_tracker(store: Arc<MemoryPendingStore>) -> ViewTracker {
        ViewTracker::with_store(
            ViewTrackingConfig::default(),
            TransportSelector::new().with(Arc::new(Capture::default())),
            store,
        )
    }

    #[test]
    fn test_track_view_dedups() {
        let (tracker, _) = tracker(10);
        assert_eq!(tracker.track_view("a"), TrackOutcome::Queued { pending: 1 });
        assert_eq!(tracker.track_view("a"), TrackOutcome::Duplicate);
        assert_eq!(tracker.pending_count(), 1);
        assert_eq!(tracker.viewed_count(), 1);
    }

    #[tokio::test]
    async fn test_flush_empty_is_noop() {
        let (tracker, capture) = tracker(10);
        assert_eq!(tracker.flush().await, FlushOutcome::Empty);
        assert!(capture.batches.lock().unwrap().is_empty());
        assert_eq!(tracker.stats().flushes, 0);
    }

    #[tokio::test]
    async fn test_flush_delivers_in_order() {
        let (tracker, capture) = tracker(10);
        tracker.track_view("a");
        tracker.track_view("b");
        assert_eq!(
            tracker.flush().await,
            FlushOutcome::Delivered {
                count: 2,
                transport: "capture"
            }
        );
        assert_eq!(*capture.batches.lock().unwrap(), vec![vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_requeues_ahead_of_new_views() {
        let (tracker, capture) = tracker(10);
        tracker.track_view("a");
        tracker.track_view("b");
        capture.fail.store(true, Ordering::SeqCst);

        let outcome = tracker.flush().await;
        assert!(matches!(outcome, FlushOutcome::Requeued { count: 2, .. }));
        tracker.track_view("c");

        assert_eq!(tracker.pending_snapshot(), vec!["a", "b", "c"]);
        assert!(tracker.has_seen("a"));
        assert_eq!(tracker.track_view("a"), TrackOutcome::Duplicate);
        assert_eq!(tracker.stats().failed_flushes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_triggers_one_flush() {
        let (tracker, capture) = tracker(3);
        tracker.track_view("a");
        tracker.track_view("b");
        assert_eq!(tracker.track_view("c"), TrackOutcome::FlushScheduled { pending: 3 });
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(tracker.track_view("d"), TrackOutcome::Queued { pending: 1 });

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        assert_eq!(*capture.batches.lock().unwrap(), vec![vec!["a", "b", "c"]]);
        assert_eq!(tracker.pending_snapshot(), vec!["d"]);
    }

    #[test]
    fn test_threshold_outside_runtime_keeps_pending() {
        let (tracker, _) = tracker(1);
        assert_eq!(tracker.track_view("a"), TrackOutcome::Queued { pending: 1 });
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn test_recover_merges_and_clears() {
        let store = Arc::new(MemoryPendingStore::with_raw(r#"["old1","old2","a"]"#));
        let tracker = stored_tracker(store.clone());
        tracker.track_view("a");

        assert_eq!(tracker.recover(), 2);
        assert_eq!(tracker.pending_snapshot(), vec!["old1", "old2", "a"]);
        assert!(tracker.has_seen("old1"));
        assert_eq!(store.raw(), None);
    }

    #[test]
    fn test_recover_clears_malformed_copy() {
        let store = Arc::new(MemoryPendingStore::with_raw("{}"));
        let tracker = stored_tracker(store.clone());
        assert_eq!(tracker.recover(), 0);
        assert_eq!(store.raw(), None);
    }

    #[test]
    fn test_persist_saves_or_clears() {
        let store = Arc::new(MemoryPendingStore::new());
        let tracker = stored_tracker(store.clone());

        tracker.track_view("a");
        assert_eq!(tracker.persist().unwrap(), 1);
        assert_eq!(store.raw().as_deref(), Some(r#"["a"]"#));

        let empty = stored_tracker(store.clone());
        assert_eq!(empty.persist().unwrap(), 0);
        assert_eq!(store.raw(), None);
    }

    #[test]
    fn test_clones_share_the_store() {
        let store = Arc::new(MemoryPendingStore::new());
        let tracker = stored_tracker(store.clone());
        let other = tracker.clone();

        tracker.track_view("a");
        assert_eq!(other.persist().unwrap(), 1);
        assert_eq!(store.raw().as_deref(), Some(r#"["a"]"#));

        let without = ViewTracker::new(ViewTrackingConfig::default(), TransportSelector::new());
        without.track_view("a");
        assert_eq!(without.persist().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unload_skips_unconfirmed_transports() {
        struct FireAndForget;

        #[async_trait]
        impl ViewTransport for FireAndForget {
            fn name(&self) -> &'static str {
                "fire-and-forget"
            }
            fn is_available(&self) -> bool {
                true
            }
            async fn send(&self, _ids: &[WorkId]) -> Result<(), DeliveryError> {
                Ok(())
            }
            fn confirms_delivery(&self) -> bool {
                false
            }
        }

        let store = Arc::new(MemoryPendingStore::new());
        let tracker = ViewTracker::with_store(
            ViewTrackingConfig::default(),
            TransportSelector::new().with(FireAndForget),
            store.clone(),
        );
        tracker.track_view("a");

        assert!(matches!(tracker.on_unload().await, FlushOutcome::Requeued { count: 1, .. }));
        assert_eq!(store.raw().as_deref(), Some(r#"["a"]"#));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = ViewTrackingConfig::default().with_batch_size(0);
        assert!(ViewTracker::from_config(config).is_err());
    }
}

//! Showcase Views - View-Count Batching
//!
//! Coalesces "work viewed" events into periodic batch deliveries to the
//! gallery's `/api/views/batch` endpoint, with session deduplication,
//! requeue on failure and recovery of undelivered views across restarts.

pub mod config;
pub mod persist;
pub mod task;
pub mod tracker;
pub mod transport;

pub use config::{
    ViewTrackingConfig, DEFAULT_BATCH_SIZE, DEFAULT_ENDPOINT, DEFAULT_FLUSH_INTERVAL_MS,
    DEFAULT_PERSIST_INTERVAL_MS,
};
pub use persist::{FilePendingStore, MemoryPendingStore, PendingStore, PENDING_VIEWS_KEY};
pub use task::{spawn_tracker_task, tracker_task, TrackerHandle};
pub use tracker::{FlushOutcome, TrackOutcome, TrackerStats, ViewTracker};
pub use transport::{
    BatchPayload, BeaconTransport, KeepAliveTransport, TransportSelector, ViewTransport,
    WORKS_FIELD,
};

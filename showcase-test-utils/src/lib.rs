//! Showcase Test Utilities
//!
//! Shared test infrastructure for the Showcase workspace:
//! - Proptest generators for cache keys, tags and work ids
//! - Fixtures for gallery works
//! - Recording and failing view transports

// Re-export core types for convenience
pub use showcase_core::{
    BackendError, DeliveryError, NewWork, SortBy, Timestamp, Work, WorkId, WorksQuery,
    MAX_WORK_ID_LEN,
};

pub use fixtures::{approved_work, approved_works, pending_work};
pub use generators::{arb_cache_key, arb_tag_set, arb_work_id, arb_work_ids};
pub use transports::{RecordingTransport, UnavailableTransport};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Showcase inputs.

    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Cache keys shaped like the ones the API builds.
    pub fn arb_cache_key() -> impl Strategy<Value = String> {
        "(works_list|work|stats):[a-z0-9=|]{1,16}"
    }

    /// Small tag sets drawn from a tiny alphabet so collisions are common.
    pub fn arb_tag_set() -> impl Strategy<Value = HashSet<String>> {
        proptest::collection::hash_set("[a-c]", 0..3)
    }

    /// Work ids accepted by the batch endpoint.
    pub fn arb_work_id() -> impl Strategy<Value = WorkId> {
        "[a-z0-9-]{1,36}"
    }

    /// A sequence of work ids with repeats.
    pub fn arb_work_ids(max: usize) -> impl Strategy<Value = Vec<WorkId>> {
        proptest::collection::vec(prop_oneof![arb_work_id(), "[a-c]"], 0..max)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made works.

    use super::*;
    use chrono::{Duration, Utc};

    /// An approved work created `minutes_ago` minutes in the past.
    pub fn approved_work(title: &str, author: &str, minutes_ago: i64) -> Work {
        let mut work = NewWork {
            title: title.to_string(),
            author: Some(author.to_string()),
            description: Some(format!("{} by {}", title, author)),
            tags: vec!["svg".to_string()],
            ..Default::default()
        }
        .into_work(Utc::now() - Duration::minutes(minutes_ago));
        work.is_approved = true;
        work
    }

    /// A freshly uploaded, unapproved work.
    pub fn pending_work(title: &str) -> Work {
        NewWork {
            title: title.to_string(),
            author: Some("pending-author".to_string()),
            ..Default::default()
        }
        .into_work(Utc::now())
    }

    /// `count` approved works, newest first by index, with views = index.
    pub fn approved_works(count: usize) -> Vec<Work> {
        (0..count)
            .map(|i| {
                let mut work = approved_work(&format!("Work {}", i), "ada", i as i64);
                work.views = i as u64;
                work.likes = (count - i) as u64;
                work
            })
            .collect()
    }
}

// ============================================================================
// TRANSPORTS
// ============================================================================

pub mod transports {
    //! View transports that never touch the network.

    use super::*;
    use async_trait::async_trait;
    use showcase_views::ViewTransport;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Records every batch it is handed. Can be switched into failure mode.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingTransport {
        batches: Arc<Mutex<Vec<Vec<WorkId>>>>,
        failing: Arc<AtomicBool>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reject subsequent sends with a 503.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn batches(&self) -> Vec<Vec<WorkId>> {
            self.batches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// All delivered ids in delivery order.
        pub fn delivered(&self) -> Vec<WorkId> {
            self.batches().into_iter().flatten().collect()
        }
    }

    #[async_trait]
    impl ViewTransport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn send(&self, ids: &[WorkId]) -> Result<(), DeliveryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DeliveryError::Rejected { status: 503 });
            }
            self.batches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ids.to_vec());
            Ok(())
        }
    }

    /// Never available.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UnavailableTransport;

    #[async_trait]
    impl ViewTransport for UnavailableTransport {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn is_available(&self) -> bool {
            false
        }

        async fn send(&self, _ids: &[WorkId]) -> Result<(), DeliveryError> {
            Err(DeliveryError::TransportUnavailable)
        }
    }
}

//! Hosted-backend abstraction.
//!
//! The gallery delegates persistence to a hosted database reached through a
//! query client. [`GalleryBackend`] is the slice of that client the server
//! uses; [`InMemoryBackend`] implements it for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use showcase_core::{BackendError, NewWork, SortBy, Work, WorkId, WorksQuery};
use tokio::sync::RwLock;

use crate::cache::QueryResult;

/// Remote operations the gallery server needs.
#[async_trait]
pub trait GalleryBackend: Send + Sync {
    // ========================================================================
    // READS
    // ========================================================================

    /// One page of approved works matching `query`, with the exact total
    /// number of matches in `count`.
    async fn list_works(&self, query: &WorksQuery) -> QueryResult<Vec<Work>>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert a new upload. The stored work is unapproved with zero counters.
    async fn insert_work(&self, new_work: NewWork) -> Result<Work, BackendError>;

    /// Batch view increment (the `increment_views_batch` RPC).
    async fn increment_views_batch(&self, ids: &[WorkId]) -> Result<(), BackendError>;

    /// Single view increment (the `increment_views` RPC).
    async fn increment_views(&self, id: &str) -> Result<(), BackendError>;

    /// Approve or reject a work. Returns the updated work, if it exists.
    async fn set_approved(&self, id: &str, approved: bool) -> Result<Option<Work>, BackendError>;

    /// Delete a work. Returns whether it existed.
    async fn delete_work(&self, id: &str) -> Result<bool, BackendError>;
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// In-memory backend for tests and local development.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    works: Arc<RwLock<HashMap<WorkId, Work>>>,
    batch_rpc: bool,
    failing: Arc<AtomicBool>,
    list_calls: Arc<AtomicUsize>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            works: Arc::new(RwLock::new(HashMap::new())),
            batch_rpc: true,
            failing: Arc::new(AtomicBool::new(false)),
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose batch RPC is missing, forcing per-id increments.
    pub fn without_batch_rpc() -> Self {
        Self {
            batch_rpc: false,
            ..Self::default()
        }
    }

    /// Seed with existing works.
    pub async fn with_works(self, works: impl IntoIterator<Item = Work>) -> Self {
        {
            let mut map = self.works.write().await;
            for work in works {
                map.insert(work.id.clone(), work);
            }
        }
        self
    }

    /// Make every subsequent call fail with `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `list_works` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn views_of(&self, id: &str) -> Option<u64> {
        self.works.read().await.get(id).map(|w| w.views)
    }

    pub async fn len(&self) -> usize {
        self.works.read().await.len()
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable {
                reason: "backend marked as failing".to_string(),
            });
        }
        Ok(())
    }
}

fn sort_works(works: &mut [Work], sort_by: SortBy) {
    match sort_by {
        SortBy::Latest => works.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortBy::Views => works.sort_by(|a, b| b.views.cmp(&a.views)),
        SortBy::Likes => works.sort_by(|a, b| b.likes.cmp(&a.likes)),
    }
}

#[async_trait]
impl GalleryBackend for InMemoryBackend {
    async fn list_works(&self, query: &WorksQuery) -> QueryResult<Vec<Work>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.check_available() {
            return QueryResult::err(e);
        }

        let works = self.works.read().await;
        let mut matching: Vec<Work> = works.values().filter(|w| query.matches(w)).cloned().collect();
        sort_works(&mut matching, query.sort_by);

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();
        QueryResult::ok_with_count(page, total)
    }

    async fn insert_work(&self, new_work: NewWork) -> Result<Work, BackendError> {
        self.check_available().map_err(|e| BackendError::InsertFailed {
            relation: "works".to_string(),
            message: e.message().to_string(),
        })?;
        let work = new_work.into_work(Utc::now());
        self.works.write().await.insert(work.id.clone(), work.clone());
        Ok(work)
    }

    async fn increment_views_batch(&self, ids: &[WorkId]) -> Result<(), BackendError> {
        self.check_available()?;
        if !self.batch_rpc {
            return Err(BackendError::RpcFailed {
                function: "increment_views_batch".to_string(),
                message: "function does not exist".to_string(),
            });
        }
        let mut works = self.works.write().await;
        for id in ids {
            if let Some(work) = works.get_mut(id) {
                work.views += 1;
            }
        }
        Ok(())
    }

    async fn increment_views(&self, id: &str) -> Result<(), BackendError> {
        self.check_available()?;
        if let Some(work) = self.works.write().await.get_mut(id) {
            work.views += 1;
        }
        Ok(())
    }

    async fn set_approved(&self, id: &str, approved: bool) -> Result<Option<Work>, BackendError> {
        self.check_available()?;
        let mut works = self.works.write().await;
        Ok(works.get_mut(id).map(|work| {
            work.is_approved = approved;
            work.clone()
        }))
    }

    async fn delete_work(&self, id: &str) -> Result<bool, BackendError> {
        self.check_available()?;
        Ok(self.works.write().await.remove(id).is_some())
    }
}

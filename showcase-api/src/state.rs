//! Shared application state for Axum routers.

use std::sync::Arc;

use showcase_core::Work;
use showcase_storage::{CacheConfig, GalleryBackend, QueryResult, TtlCache};

use crate::config::ApiConfig;

/// Response cache shared by every handler.
///
/// Feed pages are the only reads cached server-side, so the value type is
/// the backend's list result.
pub type ApiCache = TtlCache<QueryResult<Vec<Work>>>;

/// Backend handle shared by every handler.
pub type SharedBackend = Arc<dyn GalleryBackend>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Hosted backend client.
    pub backend: SharedBackend,
    /// TTL cache in front of feed reads. Mutating routes invalidate by tag.
    pub cache: ApiCache,
    pub config: Arc<ApiConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(backend: SharedBackend, cache: ApiCache, config: ApiConfig) -> Self {
        Self {
            backend,
            cache,
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }

    /// State with a fresh cache configured from the environment.
    pub fn from_env(backend: SharedBackend, config: ApiConfig) -> Self {
        Self::new(backend, TtlCache::new(CacheConfig::from_env()), config)
    }
}

crate::impl_from_ref!(SharedBackend, backend);
crate::impl_from_ref!(ApiCache, cache);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(std::time::Instant, start_time);

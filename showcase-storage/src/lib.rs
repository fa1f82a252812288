//! Showcase Storage - Response Cache and Backend Abstraction
//!
//! The TTL cache that memoizes hosted-backend reads, the read-through
//! wrapper around it, and the [`GalleryBackend`] trait the server talks to.

pub mod backend;
pub mod cache;

pub use backend::{GalleryBackend, InMemoryBackend};

// Re-export cache types for API integration
pub use cache::{
    cached_call, cached_query, invalidate_work_cache, sort_tag, work_tag,
    CacheConfig, CacheCounters, CacheOptions, CachePreset, CacheSnapshot, CachedResult, Clock,
    ManualClock, QueryResult, TokioClock, TtlCache, DEFAULT_TTL,
};

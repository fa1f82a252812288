//! Process-local TTL cache with tag invalidation.
//!
//! The cache memoizes hosted-backend reads for a bounded time. Entries carry
//! a TTL and a set of tags; a mutation invalidates every entry sharing a tag
//! instead of hunting down individual keys.
//!
//! # Expiry
//!
//! Expiry is enforced twice. A tokio timer removes each entry when its TTL
//! elapses, and every read re-checks the entry's age against a [`Clock`].
//! Only the read check is needed for correctness.
//!
//! # Example
//!
//! ```ignore
//! let cache: TtlCache<QueryResult<Vec<Work>>> = TtlCache::new(CacheConfig::from_env());
//!
//! let page = cached_query(&cache, &query.cache_key(), &CachePreset::WorksList.options(), || {
//!     backend.list_works(&query)
//! })
//! .await;
//!
//! // After an upload
//! invalidate_work_cache(&cache, None);
//! ```

pub mod clock;
pub mod invalidation;
pub mod memory;
pub mod options;
pub mod query;

pub use clock::{Clock, ManualClock, TokioClock};
pub use invalidation::{invalidate_work_cache, sort_tag, work_tag};
pub use memory::{CacheCounters, CacheSnapshot, TtlCache};
pub use options::{CacheConfig, CacheOptions, CachePreset, DEFAULT_TTL};
pub use query::{cached_call, cached_query, CachedResult, QueryResult};

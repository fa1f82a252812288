//! Read-through wrapper for hosted-backend queries.
//!
//! [`cached_query`] consults a [`TtlCache`] before running a remote read and
//! stores the result afterwards, but only when the backend returned data and
//! no error. Failures and empty results always reach the backend again on the
//! next call.
//!
//! [`cached_call`] is the plain memoizer for any async computation: whatever
//! it returns is stored under the caller's key.

use std::future::Future;

use serde::{Deserialize, Serialize};
use showcase_core::BackendError;

use super::memory::TtlCache;
use super::options::CacheOptions;

/// Result envelope of a remote query: data, an error, and an optional row
/// count, any of which may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub error: Option<BackendError>,
    /// Total matching rows when the query asked for an exact count.
    pub count: Option<u64>,
}

impl<T> QueryResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            count: None,
        }
    }

    pub fn ok_with_count(data: T, count: u64) -> Self {
        Self {
            data: Some(data),
            error: None,
            count: Some(count),
        }
    }

    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
            count: None,
        }
    }

    pub fn err(error: BackendError) -> Self {
        Self {
            data: None,
            error: Some(error),
            count: None,
        }
    }

    /// Whether this result may be stored in the cache.
    pub fn is_cacheable(&self) -> bool {
        self.error.is_none() && self.data.is_some()
    }

    /// Collapse into a `Result`, treating missing data as `None`.
    pub fn into_result(self) -> Result<Option<T>, BackendError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

impl<T> From<Result<T, BackendError>> for QueryResult<T> {
    fn from(result: Result<T, BackendError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::err(error),
        }
    }
}

/// A query result annotated with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResult<T> {
    pub result: QueryResult<T>,
    /// True when served from the cache without touching the backend.
    pub was_cache_hit: bool,
}

impl<T> CachedResult<T> {
    pub fn into_inner(self) -> QueryResult<T> {
        self.result
    }
}

/// Serve `key` from the cache, or run `fetch` and cache its result.
///
/// The cache lock is never held while `fetch` runs, so concurrent misses on
/// the same key may each reach the backend.
pub async fn cached_query<T, F, Fut>(
    cache: &TtlCache<QueryResult<T>>,
    key: &str,
    options: &CacheOptions,
    fetch: F,
) -> CachedResult<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = QueryResult<T>>,
{
    if let Some(result) = cache.get(key) {
        tracing::debug!(key, "cache hit");
        return CachedResult {
            result,
            was_cache_hit: true,
        };
    }

    tracing::debug!(key, "cache miss");
    let result = fetch().await;

    if result.is_cacheable() {
        cache.set(key, result.clone(), options);
    } else if let Some(error) = &result.error {
        tracing::debug!(key, error = %error, "query failed, not caching");
    }

    CachedResult {
        result,
        was_cache_hit: false,
    }
}

/// Memoize an async computation under `key`.
///
/// Every result is cached, errors included when `V` carries them; use
/// [`cached_query`] for backend reads that must not cache failures.
pub async fn cached_call<V, F, Fut>(cache: &TtlCache<V>, key: &str, options: &CacheOptions, call: F) -> V
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = V>,
{
    if let Some(value) = cache.get(key) {
        tracing::debug!(key, "cache hit");
        return value;
    }
    tracing::debug!(key, "cache miss");
    let value = call().await;
    cache.set(key, value.clone(), options);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failure() -> BackendError {
        BackendError::QueryFailed {
            relation: "works".to_string(),
            message: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = TtlCache::default();
        let calls = AtomicUsize::new(0);
        let options = CacheOptions::ttl_secs(60);

        for expected_hit in [false, true] {
            let out = cached_query(&cache, "k", &options, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                QueryResult::ok(vec![1, 2, 3])
            })
            .await;
            assert_eq!(out.was_cache_hit, expected_hit);
            assert_eq!(out.result.data, Some(vec![1, 2, 3]));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_is_not_cached_even_with_data() {
        let cache: TtlCache<QueryResult<Vec<i32>>> = TtlCache::default();
        let calls = AtomicUsize::new(0);
        let options = CacheOptions::new();

        for _ in 0..2 {
            let out = cached_query(&cache, "k", &options, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                QueryResult {
                    data: Some(vec![1]),
                    error: Some(failure()),
                    count: None,
                }
            })
            .await;
            assert!(!out.was_cache_hit);
            assert_eq!(out.result.error, Some(failure()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_data_is_not_cached() {
        let cache: TtlCache<QueryResult<Vec<i32>>> = TtlCache::default();
        let out = cached_query(&cache, "k", &CacheOptions::new(), || async {
            QueryResult::empty()
        })
        .await;
        assert!(!out.was_cache_hit);
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn test_empty_list_is_cached() {
        let cache: TtlCache<QueryResult<Vec<i32>>> = TtlCache::default();
        cached_query(&cache, "k", &CacheOptions::new(), || async {
            QueryResult::ok(Vec::new())
        })
        .await;
        assert_eq!(cache.get("k"), Some(QueryResult::ok(Vec::new())));
    }

    #[tokio::test]
    async fn test_cached_call_memoizes_until_invalidated() {
        let cache: TtlCache<u64> = TtlCache::default();
        let calls = AtomicUsize::new(0);
        let options = CacheOptions::ttl_secs(60).with_tag("stats");
        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            42
        };

        assert_eq!(cached_call(&cache, "stats:ada", &options, compute).await, 42);
        assert_eq!(cached_call(&cache, "stats:ada", &options, compute).await, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate_by_tag("stats");
        assert_eq!(cached_call(&cache, "stats:ada", &options, compute).await, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_call_recomputes_after_expiry() {
        let cache: TtlCache<&'static str> = TtlCache::default();
        let options = CacheOptions::ttl_secs(1);

        assert_eq!(cached_call(&cache, "k", &options, || async { "first" }).await, "first");
        assert_eq!(cached_call(&cache, "k", &options, || async { "second" }).await, "first");

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert_eq!(cached_call(&cache, "k", &options, || async { "second" }).await, "second");
    }

    #[test]
    fn test_into_result() {
        assert_eq!(QueryResult::ok(1).into_result(), Ok(Some(1)));
        assert_eq!(QueryResult::<i32>::err(failure()).into_result(), Err(failure()));
        let from: QueryResult<i32> = Err(failure()).into();
        assert!(!from.is_cacheable());
    }
}

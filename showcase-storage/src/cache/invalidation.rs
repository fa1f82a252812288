//! Tag invalidation helpers run after gallery mutations.

use super::memory::TtlCache;
use super::options::CachePreset;

/// Tag naming a single work's cached entries.
pub fn work_tag(work_id: &str) -> String {
    format!("work:{}", work_id)
}

/// Tag naming feed pages for one sort order.
pub fn sort_tag(sort_by: &str) -> String {
    format!("sort:{}", sort_by)
}

/// Drop everything a work mutation can make stale: the work itself (when
/// known), every feed page, and user stats. Returns the number of entries
/// removed.
pub fn invalidate_work_cache<V>(cache: &TtlCache<V>, work_id: Option<&str>) -> usize
where
    V: Clone + Send + Sync + 'static,
{
    let mut removed = 0;
    if let Some(id) = work_id {
        removed += cache.invalidate_by_tag(&work_tag(id));
    }
    removed += cache.invalidate_by_tag(CachePreset::WorksList.tag());
    removed += cache.invalidate_by_tag(CachePreset::UserStats.tag());
    tracing::debug!(work_id, removed, "work cache invalidated");
    removed
}

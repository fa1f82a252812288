//! Cache Administration Routes
//!
//! - `GET /api/cache` - public cache statistics
//! - `POST /api/cache` - secret-protected actions: `clear` (one key, one tag
//!   or everything), `stats` and `get`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use showcase_core::Work;
use showcase_storage::{CacheCounters, CacheSnapshot, QueryResult};

use crate::{
    config::ApiConfig,
    error::{ApiError, ApiResult},
    state::{ApiCache, AppState},
    telemetry::with_metrics,
};

// ============================================================================
// TYPES
// ============================================================================

/// Body of `POST /api/cache`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheAdminRequest {
    #[serde(default)]
    pub action: String,
    pub key: Option<String>,
    pub tag: Option<String>,
    pub secret: Option<String>,
}

/// Parsed admin action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    ClearKey(String),
    ClearTag(String),
    ClearAll,
    Stats,
    Get(Option<String>),
}

impl CacheAction {
    /// Resolve the action name plus optional key/tag. Empty strings count as
    /// absent, and a key wins over a tag.
    pub fn parse(request: &CacheAdminRequest) -> Result<Self, ApiError> {
        let key = request.key.clone().filter(|k| !k.is_empty());
        let tag = request.tag.clone().filter(|t| !t.is_empty());
        match request.action.as_str() {
            "clear" => Ok(match (key, tag) {
                (Some(key), _) => CacheAction::ClearKey(key),
                (None, Some(tag)) => CacheAction::ClearTag(tag),
                (None, None) => CacheAction::ClearAll,
            }),
            "stats" => Ok(CacheAction::Stats),
            "get" => Ok(CacheAction::Get(key)),
            other => Err(ApiError::unknown_action(other)),
        }
    }
}

/// Cache statistics: the live snapshot plus lifetime counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsView {
    #[serde(flatten)]
    pub snapshot: CacheSnapshot,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub hit_rate: f64,
}

impl CacheStatsView {
    pub fn of(cache: &ApiCache) -> Self {
        let counters: CacheCounters = cache.counters();
        Self {
            snapshot: cache.stats(),
            hits: counters.hits,
            misses: counters.misses,
            expirations: counters.expirations,
            hit_rate: counters.hit_rate(),
        }
    }
}

/// Response of `GET /api/cache`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub success: bool,
    pub stats: CacheStatsView,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Response of `POST /api/cache`. Fields not relevant to the action are
/// omitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheAdminResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStatsView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryResult<Vec<Work>>>,
}

// ============================================================================
// ACTIONS
// ============================================================================

/// Apply an admin action to the cache.
pub fn apply_action(cache: &ApiCache, action: CacheAction) -> CacheAdminResponse {
    match action {
        CacheAction::ClearKey(key) => {
            let deleted = cache.delete(&key);
            let message = if deleted {
                format!("Cache key {} cleared", key)
            } else {
                format!("Cache key {} not found", key)
            };
            CacheAdminResponse {
                success: deleted,
                message: Some(message),
                ..Default::default()
            }
        }
        CacheAction::ClearTag(tag) => {
            let removed = cache.invalidate_by_tag(&tag);
            CacheAdminResponse {
                success: true,
                message: Some(format!("Cleared all entries tagged {}", tag)),
                removed: Some(removed),
                ..Default::default()
            }
        }
        CacheAction::ClearAll => {
            let removed = cache.len();
            cache.clear();
            CacheAdminResponse {
                success: true,
                message: Some("All cache entries cleared".to_string()),
                removed: Some(removed),
                ..Default::default()
            }
        }
        CacheAction::Stats => CacheAdminResponse {
            success: true,
            stats: Some(CacheStatsView::of(cache)),
            ..Default::default()
        },
        CacheAction::Get(Some(key)) => {
            let data = cache.get(&key);
            let message = if data.is_some() {
                format!("Cache key {} found", key)
            } else {
                format!("Cache key {} not found", key)
            };
            CacheAdminResponse {
                success: data.is_some(),
                message: Some(message),
                data,
                ..Default::default()
            }
        }
        CacheAction::Get(None) => CacheAdminResponse {
            success: false,
            message: Some("A cache key is required".to_string()),
            ..Default::default()
        },
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/cache - Cache statistics (no secret required)
pub async fn cache_stats(State(cache): State<ApiCache>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        success: true,
        stats: CacheStatsView::of(&cache),
        timestamp: Utc::now().timestamp_millis(),
    })
}

/// POST /api/cache - Administrative cache actions
pub async fn cache_admin(
    State(cache): State<ApiCache>,
    State(config): State<Arc<ApiConfig>>,
    payload: Result<Json<CacheAdminRequest>, JsonRejection>,
) -> ApiResult<Json<CacheAdminResponse>> {
    let Json(request) = payload?;

    if !config.is_cache_admin_secret(request.secret.as_deref()) {
        tracing::warn!(action = %request.action, "cache admin request with wrong secret");
        return Err(ApiError::unauthorized("Not authorized"));
    }

    let action = CacheAction::parse(&request)?;
    tracing::info!(?action, "cache admin action");
    let response = apply_action(&cache, action);
    with_metrics(|m| m.set_cache_entries(cache.len()));

    Ok(Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the cache administration router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(cache_stats).post(cache_admin))
}

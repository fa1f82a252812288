//! Works REST API Routes
//!
//! - `GET /api/works` - paginated feed served through the response cache
//! - `POST /api/works` - upload a work (stored unapproved) and invalidate
//!   every cached feed page

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use showcase_core::{NewWork, Pagination, RawWorksParams, SortBy, Work, WorksQuery};
use showcase_storage::{cached_query, invalidate_work_cache, sort_tag, CachePreset, CacheOptions};

use crate::{
    constants::{CACHE_HIT_HEADER, CACHE_KEY_HEADER, WORKS_CACHE_CONTROL},
    error::{ApiError, ApiResult},
    state::{ApiCache, AppState, SharedBackend},
    telemetry::with_metrics,
};

// ============================================================================
// TYPES
// ============================================================================

/// Filters echoed back with a feed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksFilters {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub sort_by: SortBy,
    pub min_views: u64,
    pub min_likes: u64,
}

impl From<&WorksQuery> for WorksFilters {
    fn from(query: &WorksQuery) -> Self {
        Self {
            search: query.search.clone(),
            tag: query.tag.clone(),
            author: query.author.clone(),
            sort_by: query.sort_by,
            min_views: query.min_views,
            min_likes: query.min_likes,
        }
    }
}

/// Body of `GET /api/works`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksListResponse {
    pub works: Vec<Work>,
    pub pagination: Pagination,
    pub filters: WorksFilters,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Body of a successful `POST /api/works`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkResponse {
    pub success: bool,
    pub work: Work,
    pub message: String,
}

/// Cache options for one feed page: the feed preset plus the sort tag.
pub fn feed_cache_options(query: &WorksQuery) -> CacheOptions {
    CachePreset::WorksList
        .options()
        .with_tag(sort_tag(query.sort_by.as_str()))
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/works - Paginated, filtered feed of approved works
pub async fn list_works(
    State(backend): State<SharedBackend>,
    State(cache): State<ApiCache>,
    Query(params): Query<RawWorksParams>,
) -> ApiResult<Response> {
    let query = WorksQuery::from_params(params);
    let cache_key = query.cache_key();

    let cached = cached_query(&cache, &cache_key, &feed_cache_options(&query), || async {
        backend.list_works(&query).await
    })
    .await;
    let was_cache_hit = cached.was_cache_hit;

    with_metrics(|m| {
        m.record_cache_lookup(was_cache_hit);
        m.set_cache_entries(cache.len());
    });

    let result = cached.into_inner();
    let count = result.count;
    let works = result
        .into_result()
        .map_err(|e| ApiError::backend_error("Failed to load works", &e))?
        .unwrap_or_default();

    let body = WorksListResponse {
        pagination: Pagination::for_page(&query, works.len(), count),
        filters: WorksFilters::from(&query),
        works,
        timestamp: Utc::now().timestamp_millis(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(WORKS_CACHE_CONTROL),
    );
    match HeaderValue::from_str(&cache_key) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(CACHE_KEY_HEADER), value);
        }
        Err(_) => tracing::debug!(cache_key, "cache key is not a valid header value"),
    }
    headers.insert(
        HeaderName::from_static(CACHE_HIT_HEADER),
        HeaderValue::from_static(if was_cache_hit { "true" } else { "false" }),
    );

    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

/// POST /api/works - Upload a new work
pub async fn create_work(
    State(backend): State<SharedBackend>,
    State(cache): State<ApiCache>,
    payload: Result<Json<NewWork>, JsonRejection>,
) -> ApiResult<Json<CreateWorkResponse>> {
    let Json(new_work) = payload?;
    new_work.validate()?;

    let work = backend
        .insert_work(new_work)
        .await
        .map_err(|e| ApiError::backend_error("Failed to create work", &e))?;

    let removed = invalidate_work_cache(&cache, None);
    tracing::info!(work_id = %work.id, removed, "work uploaded, feed cache invalidated");
    with_metrics(|m| m.set_cache_entries(cache.len()));

    Ok(Json(CreateWorkResponse {
        success: true,
        work,
        message: "Work submitted for review".to_string(),
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the works router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(list_works).post(create_work))
}

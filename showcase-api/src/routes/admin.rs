//! Moderation Routes
//!
//! - `PATCH /api/admin/works/:id` - approve or unapprove a work
//! - `DELETE /api/admin/works/:id` - remove a work
//!
//! Callers identify themselves with the `x-admin-user` header, which must
//! name a configured admin. Every successful mutation invalidates the
//! work's cached entries, the feed pages and user stats.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::patch,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use showcase_core::Work;
use showcase_storage::invalidate_work_cache;

use crate::{
    config::ApiConfig,
    constants::ADMIN_USER_HEADER,
    error::{ApiError, ApiResult},
    state::{ApiCache, AppState, SharedBackend},
    telemetry::with_metrics,
};

// ============================================================================
// TYPES
// ============================================================================

/// Body of `PATCH /api/admin/works/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerateWorkRequest {
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerateWorkResponse {
    pub success: bool,
    pub work: Work,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteWorkResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// AUTHORIZATION
// ============================================================================

/// Resolve the acting admin from request headers.
///
/// A missing header is 401; a user not on the admin list is 403.
pub fn require_admin(headers: &HeaderMap, config: &ApiConfig) -> ApiResult<String> {
    let username = headers
        .get(ADMIN_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Admin user header required"))?;

    if !config.is_admin(Some(username)) {
        tracing::warn!(username, "non-admin attempted moderation");
        return Err(ApiError::forbidden(format!("{} is not an admin", username)));
    }
    Ok(username.to_string())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// PATCH /api/admin/works/:id - Approve or unapprove a work
pub async fn moderate_work(
    State(backend): State<SharedBackend>,
    State(cache): State<ApiCache>,
    State(config): State<Arc<ApiConfig>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ModerateWorkRequest>, JsonRejection>,
) -> ApiResult<Json<ModerateWorkResponse>> {
    let admin = require_admin(&headers, &config)?;
    let Json(request) = payload?;

    let work = backend
        .set_approved(&id, request.approved)
        .await?
        .ok_or_else(|| ApiError::work_not_found(&id))?;

    let removed = invalidate_work_cache(&cache, Some(&id));
    with_metrics(|m| m.set_cache_entries(cache.len()));
    tracing::info!(admin = %admin, work_id = %id, approved = request.approved, removed, "work moderated");

    Ok(Json(ModerateWorkResponse {
        success: true,
        work,
    }))
}

/// DELETE /api/admin/works/:id - Remove a work
pub async fn delete_work(
    State(backend): State<SharedBackend>,
    State(cache): State<ApiCache>,
    State(config): State<Arc<ApiConfig>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<DeleteWorkResponse>> {
    let admin = require_admin(&headers, &config)?;

    if !backend.delete_work(&id).await? {
        return Err(ApiError::work_not_found(&id));
    }

    let removed = invalidate_work_cache(&cache, Some(&id));
    with_metrics(|m| m.set_cache_entries(cache.len()));
    tracing::info!(admin = %admin, work_id = %id, removed, "work deleted");

    Ok(Json(DeleteWorkResponse {
        success: true,
        message: format!("Work {} deleted", id),
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the moderation router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/works/:id", patch(moderate_work).delete(delete_work))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers_for(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_USER_HEADER, HeaderValue::from_str(user).unwrap());
        headers
    }

    #[test]
    fn test_require_admin_accepts_listed_user() {
        let config = ApiConfig::default().with_admin_user("ada");
        assert_eq!(require_admin(&headers_for("ada"), &config).unwrap(), "ada");
    }

    #[test]
    fn test_require_admin_rejections() {
        let config = ApiConfig::default().with_admin_user("ada");

        let missing = require_admin(&HeaderMap::new(), &config).unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

        let blank = require_admin(&headers_for("  "), &config).unwrap_err();
        assert_eq!(blank.status_code(), StatusCode::UNAUTHORIZED);

        let stranger = require_admin(&headers_for("mallory"), &config).unwrap_err();
        assert_eq!(stranger.status_code(), StatusCode::FORBIDDEN);
    }
}

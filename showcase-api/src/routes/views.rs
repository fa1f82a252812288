//! View Batch Ingestion Route
//!
//! `POST /api/views/batch` receives the batches the view tracker flushes.
//! Two encodings are accepted: a JSON body `{ "works": [..] }` from the
//! keep-alive transport, and a multipart form whose `works` field holds a
//! JSON array string from the beacon transport.
//!
//! The id list is filtered to non-empty strings of at most
//! [`MAX_WORK_ID_LEN`] characters and truncated to [`MAX_BATCH_ITEMS`]
//! before the backend batch increment runs. If the batch RPC fails, every
//! id is incremented individually instead.

use axum::{
    body::to_bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use showcase_core::{WorkId, MAX_WORK_ID_LEN};
use showcase_views::WORKS_FIELD;
use thiserror::Error;

use crate::{
    constants::{MAX_BATCH_BODY_BYTES, MAX_BATCH_ITEMS},
    error::{ApiError, ApiResult},
    state::{AppState, SharedBackend},
    telemetry::with_metrics,
};

// ============================================================================
// TYPES
// ============================================================================

/// Reasons a works list is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorksListError {
    #[error("invalid works list")]
    NotAList,

    #[error("no valid work ids")]
    NoValidIds,
}

impl From<WorksListError> for ApiError {
    fn from(err: WorksListError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

/// Body of a successful batch ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewBatchResponse {
    pub success: bool,
    pub updated: usize,
    pub message: String,
}

// ============================================================================
// VALIDATION
// ============================================================================

fn is_valid_work_id(id: &str) -> bool {
    let len = id.chars().count();
    len > 0 && len <= MAX_WORK_ID_LEN
}

/// Turn the raw `works` value into the ids to increment.
///
/// Non-array values and empty arrays are rejected. Non-string, empty and
/// over-long entries are dropped; the result keeps request order and holds
/// at most [`MAX_BATCH_ITEMS`] ids.
pub fn validate_work_ids(raw: &Value) -> Result<Vec<WorkId>, WorksListError> {
    let items = match raw {
        Value::Array(items) if !items.is_empty() => items,
        _ => return Err(WorksListError::NotAList),
    };

    let ids: Vec<WorkId> = items
        .iter()
        .filter_map(Value::as_str)
        .filter(|id| is_valid_work_id(id))
        .take(MAX_BATCH_ITEMS)
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err(WorksListError::NoValidIds);
    }
    Ok(ids)
}

// ============================================================================
// BODY DECODING
// ============================================================================

/// Pull the `works` value out of the request according to its content type.
///
/// A missing or `null` field reads as an empty list; an unsupported content
/// type does too.
async fn extract_works(request: Request) -> ApiResult<Value> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let works = if content_type.starts_with("application/json") {
        let body = to_bytes(request.into_body(), MAX_BATCH_BODY_BYTES)
            .await
            .map_err(|e| ApiError::invalid_input(format!("Failed to read body: {}", e)))?;
        let mut payload: Value = serde_json::from_slice(&body)?;
        payload
            .get_mut(WORKS_FIELD)
            .map(Value::take)
            .unwrap_or(Value::Null)
    } else if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::invalid_input(e.body_text()))?;
        let mut works = Value::Null;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::invalid_input(e.body_text()))?
        {
            if field.name() == Some(WORKS_FIELD) {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid_input(e.body_text()))?;
                works = serde_json::from_str(&text)?;
                break;
            }
        }
        works
    } else {
        tracing::debug!(content_type, "unsupported view batch content type");
        Value::Null
    };

    Ok(match works {
        Value::Null => Value::Array(Vec::new()),
        other => other,
    })
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/views/batch - Increment view counters for a batch of works
pub async fn ingest_view_batch(
    State(backend): State<SharedBackend>,
    request: Request,
) -> ApiResult<Json<ViewBatchResponse>> {
    let raw = extract_works(request).await?;
    let ids = validate_work_ids(&raw)?;

    if let Err(e) = backend.increment_views_batch(&ids).await {
        tracing::warn!(error = %e, count = ids.len(), "batch view increment failed, falling back to single increments");
        for id in &ids {
            if let Err(e) = backend.increment_views(id).await {
                tracing::debug!(work_id = %id, error = %e, "single view increment failed");
            }
        }
    }

    let updated = ids.len();
    with_metrics(|m| m.record_view_ids(updated));
    tracing::debug!(updated, "view batch applied");

    Ok(Json(ViewBatchResponse {
        success: true,
        updated,
        message: format!("Updated views for {} works", updated),
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the views router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/batch", post(ingest_view_batch))
}

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use showcase_api::{create_api_router, telemetry::TelemetryConfig, ApiConfig, ApiCache, AppState};
use showcase_storage::InMemoryBackend;
use tower::ServiceExt; // for `oneshot`

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_ADMIN: &str = "ada";

pub fn test_config() -> ApiConfig {
    ApiConfig::default()
        .with_cache_admin_secret(TEST_SECRET)
        .with_admin_user(TEST_ADMIN)
}

pub fn test_telemetry() -> TelemetryConfig {
    TelemetryConfig {
        metrics_enabled: true,
        ..TelemetryConfig::default()
    }
}

/// Router over `backend` plus a handle on its cache.
pub fn test_app(backend: InMemoryBackend) -> (Router, ApiCache) {
    let state = AppState::new(Arc::new(backend), ApiCache::default(), test_config());
    let cache = state.cache.clone();
    (create_api_router(state, &test_telemetry()), cache)
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Run one request and decode the body as JSON (`Null` when empty or not JSON).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

/// Run one request and return the raw body text.
pub async fn send_text(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

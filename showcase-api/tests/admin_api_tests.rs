//! Cache administration, moderation, health and metrics routes.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::json;
use showcase_storage::InMemoryBackend;
use showcase_test_utils::{approved_works, pending_work};

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{
    get_request, json_request, send, send_text, test_app, TEST_ADMIN, TEST_SECRET,
};

fn admin_request(method: Method, uri: &str, user: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-admin-user", user)
        .header("content-type", "application/json");
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    builder.body(body).unwrap()
}

// ============================================================================
// CACHE ADMINISTRATION
// ============================================================================

#[tokio::test]
async fn test_cache_stats_are_public() {
    let backend = InMemoryBackend::new().with_works(approved_works(1)).await;
    let (app, _cache) = test_app(backend);
    send(&app, get_request("/api/works")).await;

    let (status, _, body) = send(&app, get_request("/api/cache")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["size"], 1);
    assert!(body["stats"]["keys"][0]
        .as_str()
        .unwrap()
        .starts_with("works_list:"));
    assert_eq!(body["stats"]["misses"], 1);
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_cache_admin_requires_secret() {
    let (app, _cache) = test_app(InMemoryBackend::new());

    for body in [
        json!({ "action": "stats" }),
        json!({ "action": "stats", "secret": "admin-secret-key" }),
    ] {
        let (status, _, response) =
            send(&app, json_request(Method::POST, "/api/cache", &body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_cache_admin_unknown_action() {
    let (app, _cache) = test_app(InMemoryBackend::new());
    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/cache",
            &json!({ "action": "flush", "secret": TEST_SECRET }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_ACTION");
}

#[tokio::test]
async fn test_cache_admin_get_and_clear_key() {
    let backend = InMemoryBackend::new().with_works(approved_works(2)).await;
    let (app, cache) = test_app(backend);

    let (_, headers, _) = send(&app, get_request("/api/works")).await;
    let key = headers["x-cache-key"].to_str().unwrap().to_string();

    let (_, _, found) = send(
        &app,
        json_request(
            Method::POST,
            "/api/cache",
            &json!({ "action": "get", "key": key, "secret": TEST_SECRET }),
        ),
    )
    .await;
    assert_eq!(found["success"], true);
    assert_eq!(found["data"]["count"], 2);

    let (_, _, cleared) = send(
        &app,
        json_request(
            Method::POST,
            "/api/cache",
            &json!({ "action": "clear", "key": key, "secret": TEST_SECRET }),
        ),
    )
    .await;
    assert_eq!(cleared["success"], true);
    assert!(cache.is_empty());

    let (_, _, again) = send(
        &app,
        json_request(
            Method::POST,
            "/api/cache",
            &json!({ "action": "clear", "key": key, "secret": TEST_SECRET }),
        ),
    )
    .await;
    assert_eq!(again["success"], false);

    let (_, _, no_key) = send(
        &app,
        json_request(
            Method::POST,
            "/api/cache",
            &json!({ "action": "get", "secret": TEST_SECRET }),
        ),
    )
    .await;
    assert_eq!(no_key["success"], false);
    assert!(no_key.get("data").is_none());
}

#[tokio::test]
async fn test_cache_admin_clear_all_and_stats() {
    let backend = InMemoryBackend::new().with_works(approved_works(2)).await;
    let (app, cache) = test_app(backend);
    send(&app, get_request("/api/works?page=1")).await;
    send(&app, get_request("/api/works?page=2")).await;
    assert_eq!(cache.len(), 2);

    let (_, _, stats) = send(
        &app,
        json_request(
            Method::POST,
            "/api/cache",
            &json!({ "action": "stats", "secret": TEST_SECRET }),
        ),
    )
    .await;
    assert_eq!(stats["stats"]["size"], 2);

    let (_, _, cleared) = send(
        &app,
        json_request(
            Method::POST,
            "/api/cache",
            &json!({ "action": "clear", "secret": TEST_SECRET }),
        ),
    )
    .await;
    assert_eq!(cleared["success"], true);
    assert_eq!(cleared["removed"], 2);
    assert!(cache.is_empty());
}

// ============================================================================
// MODERATION
// ============================================================================

#[tokio::test]
async fn test_approving_a_work_refreshes_the_feed() {
    let draft = pending_work("Draft");
    let draft_id = draft.id.clone();
    let backend = InMemoryBackend::new().with_works([draft]).await;
    let (app, cache) = test_app(backend);

    let (_, _, before) = send(&app, get_request("/api/works")).await;
    assert_eq!(before["pagination"]["total"], 0);
    assert_eq!(cache.len(), 1);

    let uri = format!("/api/admin/works/{}", draft_id);
    let (status, _, body) = send(
        &app,
        admin_request(Method::PATCH, &uri, TEST_ADMIN, Some(json!({ "approved": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["work"]["is_approved"], true);
    assert!(cache.is_empty());

    let (_, _, after) = send(&app, get_request("/api/works")).await;
    assert_eq!(after["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_moderation_requires_admin() {
    let draft = pending_work("Draft");
    let uri = format!("/api/admin/works/{}", draft.id);
    let backend = InMemoryBackend::new().with_works([draft]).await;
    let (app, _cache) = test_app(backend);

    let (status, _, _) = send(
        &app,
        admin_request(Method::PATCH, &uri, "mallory", Some(json!({ "approved": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &app,
        json_request(Method::PATCH, &uri, &json!({ "approved": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_work() {
    let works = approved_works(1);
    let uri = format!("/api/admin/works/{}", works[0].id);
    let backend = InMemoryBackend::new().with_works(works).await;
    let (app, _cache) = test_app(backend.clone());

    let (status, _, body) = send(&app, admin_request(Method::DELETE, &uri, TEST_ADMIN, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(backend.len().await, 0);

    let (status, _, body) = send(&app, admin_request(Method::DELETE, &uri, TEST_ADMIN, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "WORK_NOT_FOUND");
}

// ============================================================================
// HEALTH AND METRICS
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _cache) = test_app(InMemoryBackend::new());

    let (status, text) = send_text(&app, get_request("/health/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "pong");

    let (status, _, body) = send(&app, get_request("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["cache_entries"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_showcase_metrics() {
    let backend = InMemoryBackend::new().with_works(approved_works(1)).await;
    let (app, _cache) = test_app(backend);
    send(&app, get_request("/api/works")).await;

    let (status, text) = send_text(&app, get_request("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("showcase_cache_lookups_total"));
    assert!(text.contains("showcase_http_requests_total"));
}

#[tokio::test]
async fn test_unknown_path_returns_structured_not_found() {
    let (app, _cache) = test_app(InMemoryBackend::new());

    let (status, _, body) = send(&app, get_request("/api/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ROUTE_NOT_FOUND");
    assert_eq!(body["message"], "Route not found");
}

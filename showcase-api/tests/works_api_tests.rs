//! Works feed and upload routes over an in-memory backend.

use axum::http::{Method, StatusCode};
use serde_json::json;
use showcase_storage::InMemoryBackend;
use showcase_test_utils::approved_works;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{get_request, json_request, send, test_app, TEST_SECRET};

#[tokio::test]
async fn test_feed_second_request_is_served_from_cache() {
    let backend = InMemoryBackend::new().with_works(approved_works(3)).await;
    let (app, cache) = test_app(backend.clone());

    let (status, headers, body) = send(&app, get_request("/api/works?page=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache-hit"], "false");
    assert_eq!(
        headers["cache-control"],
        "public, s-maxage=300, stale-while-revalidate=600"
    );
    let key = headers["x-cache-key"].to_str().unwrap().to_string();
    assert!(key.starts_with("works_list:"));
    assert_eq!(body["works"].as_array().unwrap().len(), 3);

    let (_, headers, _) = send(&app, get_request("/api/works?page=1")).await;
    assert_eq!(headers["x-cache-hit"], "true");
    assert_eq!(headers["x-cache-key"].to_str().unwrap(), key);

    assert_eq!(backend.list_calls(), 1);
    assert!(cache.get(&key).is_some());
}

#[tokio::test]
async fn test_feed_pagination_and_filters() {
    let backend = InMemoryBackend::new().with_works(approved_works(15)).await;
    let (app, _cache) = test_app(backend);

    let (_, _, first) = send(&app, get_request("/api/works")).await;
    assert_eq!(first["pagination"]["page"], 1);
    assert_eq!(first["pagination"]["limit"], 12);
    assert_eq!(first["pagination"]["total"], 15);
    assert_eq!(first["pagination"]["hasMore"], true);
    assert_eq!(first["works"][0]["title"], "Work 0");
    assert_eq!(first["filters"]["sortBy"], "latest");
    assert!(first["timestamp"].as_i64().unwrap() > 0);

    let (_, _, second) = send(&app, get_request("/api/works?page=2")).await;
    assert_eq!(second["works"].as_array().unwrap().len(), 3);
    assert_eq!(second["pagination"]["hasMore"], false);

    let (_, _, by_views) = send(&app, get_request("/api/works?sortBy=views&minViews=10")).await;
    assert_eq!(by_views["works"][0]["title"], "Work 14");
    assert_eq!(by_views["pagination"]["total"], 5);
    assert_eq!(by_views["filters"]["minViews"], 10);
}

#[tokio::test]
async fn test_garbage_params_fall_back_to_defaults() {
    let backend = InMemoryBackend::new().with_works(approved_works(2)).await;
    let (app, _cache) = test_app(backend);

    let (status, _, body) = send(
        &app,
        get_request("/api/works?page=zero&limit=9999&sortBy=random"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 50);
    assert_eq!(body["filters"]["sortBy"], "latest");
}

#[tokio::test]
async fn test_upload_invalidates_cached_feed() {
    let backend = InMemoryBackend::new().with_works(approved_works(2)).await;
    let (app, cache) = test_app(backend.clone());

    send(&app, get_request("/api/works")).await;
    assert_eq!(cache.len(), 1);

    let upload = json!({ "title": "Spiral", "author": "grace", "tags": ["svg"] });
    let (status, _, body) = send(&app, json_request(Method::POST, "/api/works", &upload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["work"]["is_approved"], false);
    assert_eq!(body["work"]["views"], 0);
    assert!(cache.is_empty());

    let (_, headers, feed) = send(&app, get_request("/api/works")).await;
    assert_eq!(headers["x-cache-hit"], "false");
    // Uploads wait for approval, so the feed is unchanged.
    assert_eq!(feed["pagination"]["total"], 2);
    assert_eq!(backend.len().await, 3);
    assert_eq!(backend.list_calls(), 2);
}

#[tokio::test]
async fn test_upload_requires_title_and_author() {
    let (app, _cache) = test_app(InMemoryBackend::new());

    let (status, _, body) = send(
        &app,
        json_request(Method::POST, "/api/works", &json!({ "title": "Untitled" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    assert!(body["message"].as_str().unwrap().contains("author"));

    let (status, _, _) = send(
        &app,
        json_request(Method::POST, "/api/works", &json!({ "author": "ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backend_failure_is_reported_and_not_cached() {
    let backend = InMemoryBackend::new().with_works(approved_works(2)).await;
    let (app, cache) = test_app(backend.clone());

    backend.set_failing(true);
    let (status, _, body) = send(&app, get_request("/api/works")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "BACKEND_ERROR");
    assert!(body["details"].is_string());
    assert!(cache.is_empty());

    backend.set_failing(false);
    let (status, headers, _) = send(&app, get_request("/api/works")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache-hit"], "false");
    assert_eq!(backend.list_calls(), 2);
}

#[tokio::test]
async fn test_sort_tag_invalidates_only_that_ordering() {
    let backend = InMemoryBackend::new().with_works(approved_works(4)).await;
    let (app, cache) = test_app(backend);

    send(&app, get_request("/api/works?sortBy=views")).await;
    send(&app, get_request("/api/works?sortBy=likes")).await;
    assert_eq!(cache.len(), 2);

    let clear = json!({ "action": "clear", "tag": "sort:views", "secret": TEST_SECRET });
    let (status, _, body) = send(&app, json_request(Method::POST, "/api/cache", &clear)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, likes_headers, _) = send(&app, get_request("/api/works?sortBy=likes")).await;
    assert_eq!(likes_headers["x-cache-hit"], "true");
    let (_, views_headers, _) = send(&app, get_request("/api/works?sortBy=views")).await;
    assert_eq!(views_headers["x-cache-hit"], "false");
}

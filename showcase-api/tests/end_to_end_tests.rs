//! View tracker flushing into a live server.
//!
//! Binds the full router on an ephemeral port and points real transports at
//! `/api/views/batch`.

use std::sync::Arc;
use std::time::Duration;

use showcase_api::{create_api_router, ApiCache, AppState};
use showcase_storage::InMemoryBackend;
use showcase_test_utils::approved_works;
use showcase_views::{
    spawn_tracker_task, BeaconTransport, FlushOutcome, KeepAliveTransport, MemoryPendingStore,
    TransportSelector, ViewTracker, ViewTrackingConfig,
};
use tokio::net::TcpListener;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{test_config, test_telemetry};

/// Serve the API over `backend`; returns the batch endpoint URL.
async fn spawn_server(backend: InMemoryBackend) -> String {
    let state = AppState::new(Arc::new(backend), ApiCache::default(), test_config());
    let app = create_api_router(state, &test_telemetry());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/views/batch", addr)
}

fn tracker_for(endpoint: &str, transports: TransportSelector) -> ViewTracker {
    let config = ViewTrackingConfig::default()
        .with_batch_size(50)
        .with_endpoint(endpoint);
    ViewTracker::new(config, transports)
}

#[tokio::test]
async fn test_keep_alive_flush_increments_views() {
    let works = approved_works(3);
    let ids: Vec<String> = works.iter().map(|w| w.id.clone()).collect();
    let backend = InMemoryBackend::new().with_works(works).await;
    let endpoint = spawn_server(backend.clone()).await;
    let before = backend.views_of(&ids[0]).await.unwrap();

    let transports =
        TransportSelector::new().with(KeepAliveTransport::new(reqwest::Client::new(), &endpoint));
    let tracker = tracker_for(&endpoint, transports);

    tracker.track_view(ids[0].clone());
    tracker.track_view(ids[0].clone());
    tracker.track_view(ids[1].clone());

    let outcome = tracker.flush().await;
    assert_eq!(
        outcome,
        FlushOutcome::Delivered {
            count: 2,
            transport: "keep-alive"
        }
    );
    assert_eq!(tracker.pending_count(), 0);
    assert_eq!(backend.views_of(&ids[0]).await, Some(before + 1));
}

#[tokio::test]
async fn test_beacon_flush_reaches_server() {
    let works = approved_works(1);
    let id = works[0].id.clone();
    let backend = InMemoryBackend::new().with_works(works).await;
    let endpoint = spawn_server(backend.clone()).await;
    let before = backend.views_of(&id).await.unwrap();

    let transports =
        TransportSelector::new().with(BeaconTransport::new(reqwest::Client::new(), &endpoint));
    let tracker = tracker_for(&endpoint, transports);
    tracker.track_view(id.clone());

    assert!(tracker.flush().await.is_delivered());

    // The beacon returns before the request lands.
    let mut views = before;
    for _ in 0..50 {
        views = backend.views_of(&id).await.unwrap();
        if views > before {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(views, before + 1);
}

#[tokio::test]
async fn test_rejected_batch_is_requeued() {
    let endpoint = spawn_server(InMemoryBackend::new()).await;
    // An empty id is tracked but rejected by the endpoint.
    let transports =
        TransportSelector::new().with(KeepAliveTransport::new(reqwest::Client::new(), &endpoint));
    let tracker = tracker_for(&endpoint, transports);
    tracker.track_view("");

    let outcome = tracker.flush().await;
    assert!(matches!(outcome, FlushOutcome::Requeued { count: 1, .. }));
    assert_eq!(tracker.pending_snapshot(), vec![String::new()]);
}

#[tokio::test]
async fn test_shutdown_lands_every_view_before_returning() {
    let works = approved_works(2);
    let ids: Vec<String> = works.iter().map(|w| w.id.clone()).collect();
    let backend = InMemoryBackend::new().with_works(works).await;
    let endpoint = spawn_server(backend.clone()).await;
    let before: Vec<u64> = vec![
        backend.views_of(&ids[0]).await.unwrap(),
        backend.views_of(&ids[1]).await.unwrap(),
    ];

    let store = Arc::new(MemoryPendingStore::new());
    let config = ViewTrackingConfig::default().with_endpoint(&endpoint);
    let tracker =
        ViewTracker::with_store(config.clone(), TransportSelector::standard(&config), store.clone());
    let handle = spawn_tracker_task(tracker.clone()).unwrap();

    // One view leaves by beacon, the other is still pending at shutdown.
    tracker.track_view(ids[0].clone());
    assert_eq!(
        tracker.flush().await,
        FlushOutcome::Delivered {
            count: 1,
            transport: "beacon"
        }
    );
    tracker.track_view(ids[1].clone());
    handle.shutdown().await;

    assert_eq!(backend.views_of(&ids[0]).await, Some(before[0] + 1));
    assert_eq!(backend.views_of(&ids[1]).await, Some(before[1] + 1));
    assert_eq!(store.raw(), None);
}

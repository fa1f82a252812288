//! REST API Routes Module
//!
//! Includes:
//! - Works feed and uploads (`/api/works`)
//! - View batch ingestion (`/api/views/batch`)
//! - Cache administration (`/api/cache`)
//! - Moderation (`/api/admin/works/:id`)
//! - Health check endpoints (`/health/*`)
//! - Prometheus metrics (`/metrics`)
//! - CORS support for browser-based clients

pub mod admin;
pub mod cache;
pub mod health;
pub mod views;
pub mod works;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware, TelemetryConfig};

// Re-export route creation functions for convenience
pub use admin::create_router as admin_router;
pub use cache::create_router as cache_router;
pub use health::create_router as health_router;
pub use views::create_router as views_router;
pub use works::create_router as works_router;

/// Build the CORS layer from configuration.
///
/// An empty origin list allows every origin.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Structured 404 for paths no router matches.
async fn route_not_found() -> ApiError {
    ApiError::from_code(ErrorCode::RouteNotFound)
}

/// Create the complete API router.
///
/// - `/api/works`, `/api/views`, `/api/cache`, `/api/admin`
/// - `/health/*` (public)
/// - `/metrics` (when enabled)
pub fn create_api_router(state: AppState, telemetry: &TelemetryConfig) -> Router {
    let api_routes = Router::new()
        .nest("/works", works::create_router())
        .nest("/views", views::create_router())
        .nest("/cache", cache::create_router())
        .nest("/admin", admin::create_router());

    let mut router = Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::create_router());

    if telemetry.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let cors = build_cors_layer(&state.config);
    router
        .fallback(route_not_found)
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! Showcase API Server Entry Point
//!
//! Bootstraps configuration and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use showcase_api::constants::{DEFAULT_BIND_HOST, DEFAULT_PORT};
use showcase_api::telemetry::{init_tracing, TelemetryConfig};
use showcase_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};
use showcase_storage::InMemoryBackend;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    // The server ships with the in-memory backend.
    let backend = Arc::new(InMemoryBackend::new());
    let state = AppState::from_env(backend, api_config);
    let cache = state.cache.clone();

    let app: Router = create_api_router(state, &telemetry_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Showcase API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    cache.dispose();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("SHOWCASE_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("SHOWCASE_API_PORT").ok())
        .unwrap_or_else(|| DEFAULT_PORT.to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}

//! Showcase API - HTTP Layer
//!
//! Axum server for the gallery: the cached works feed, the endpoint the view
//! tracker flushes batches to, cache administration, moderation, health and
//! metrics.
//!
//! Persistence is delegated to a [`showcase_storage::GalleryBackend`]; the
//! response cache is a [`showcase_storage::TtlCache`] held in [`AppState`].

pub mod config;
pub mod constants;
pub mod error;
pub mod macros;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::{ApiCache, AppState, SharedBackend};

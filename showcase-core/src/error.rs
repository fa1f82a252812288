//! Error types for Showcase operations

use std::time::Duration;
use thiserror::Error;

/// Errors reported by the hosted backend (the remote query interface).
///
/// These are passed through untouched by the cache wrapper; they are never
/// cached and never interpreted beyond "the call failed".
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BackendError {
    #[error("Query failed on {relation}: {message}")]
    QueryFailed { relation: String, message: String },

    #[error("Insert failed on {relation}: {message}")]
    InsertFailed { relation: String, message: String },

    #[error("RPC {function} failed: {message}")]
    RpcFailed { function: String, message: String },

    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },
}

impl BackendError {
    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            BackendError::QueryFailed { message, .. }
            | BackendError::InsertFailed { message, .. }
            | BackendError::RpcFailed { message, .. } => message,
            BackendError::Unavailable { reason } => reason,
        }
    }
}

/// View delivery errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("No delivery transport available")]
    TransportUnavailable,

    #[error("Delivery via {transport} failed: {reason}")]
    SendFailed { transport: String, reason: String },

    #[error("Endpoint rejected delivery with status {status}")]
    Rejected { status: u16 },
}

/// Pending-queue persistence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Persisted pending queue is malformed: {reason}")]
    Malformed { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Too many items: {count} exceeds limit of {limit}")]
    TooManyItems { count: usize, limit: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Interval for {field} must be non-zero, got {value:?}")]
    ZeroInterval { field: String, value: Duration },
}

/// Master error type for all Showcase errors.
#[derive(Debug, Clone, Error)]
pub enum ShowcaseError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Showcase operations.
pub type ShowcaseResult<T> = Result<T, ShowcaseError>;

// =============================================================================
// TESTS
// =============================================================================

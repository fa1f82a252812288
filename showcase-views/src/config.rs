//! View tracker configuration.

use std::path::PathBuf;
use std::time::Duration;

use showcase_core::ConfigError;

/// Flush as soon as this many distinct views are pending.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Recurring flush period in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 30_000;

/// Recurring pending-queue save period in milliseconds.
pub const DEFAULT_PERSIST_INTERVAL_MS: u64 = 10_000;

/// Batch ingestion endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/views/batch";

/// Boolean env value: `true`, `1`, `yes` and `on` (any case) enable,
/// anything else disables.
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Configuration for the view tracker and its background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTrackingConfig {
    /// Pending-queue length that triggers an immediate flush (default: 10)
    pub batch_size: usize,

    /// How often pending views are flushed (default: 30 seconds)
    pub flush_interval: Duration,

    /// How often pending views are saved for recovery (default: 10 seconds)
    pub persist_interval: Duration,

    /// Absolute URL of the batch ingestion endpoint
    pub endpoint: String,

    /// Directory for the persisted pending queue. `None` disables persistence.
    pub storage_dir: Option<PathBuf>,

    /// Whether the fire-and-forget beacon transport may be used (default: true)
    pub beacon_enabled: bool,
}

impl Default for ViewTrackingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            persist_interval: Duration::from_millis(DEFAULT_PERSIST_INTERVAL_MS),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            storage_dir: None,
            beacon_enabled: true,
        }
    }
}

impl ViewTrackingConfig {
    /// Create ViewTrackingConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `SHOWCASE_VIEWS_BATCH_SIZE`: Flush threshold (default: 10)
    /// - `SHOWCASE_VIEWS_FLUSH_INTERVAL_MS`: Flush period (default: 30000)
    /// - `SHOWCASE_VIEWS_PERSIST_INTERVAL_MS`: Save period (default: 10000)
    /// - `SHOWCASE_VIEWS_ENDPOINT`: Batch endpoint URL
    /// - `SHOWCASE_VIEWS_STORAGE_DIR`: Directory for `pendingViews.json` (unset: no persistence)
    /// - `SHOWCASE_VIEWS_BEACON`: Allow the beacon transport (default: true)
    pub fn from_env() -> Self {
        let batch_size = std::env::var("SHOWCASE_VIEWS_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let flush_interval = Duration::from_millis(
            std::env::var("SHOWCASE_VIEWS_FLUSH_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
        );

        let persist_interval = Duration::from_millis(
            std::env::var("SHOWCASE_VIEWS_PERSIST_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PERSIST_INTERVAL_MS),
        );

        let endpoint = std::env::var("SHOWCASE_VIEWS_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        let storage_dir = std::env::var("SHOWCASE_VIEWS_STORAGE_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let beacon_enabled = std::env::var("SHOWCASE_VIEWS_BEACON")
            .map(|s| parse_flag(&s))
            .unwrap_or(true);

        Self {
            batch_size,
            flush_interval,
            persist_interval,
            endpoint,
            storage_dir,
            beacon_enabled,
        }
    }

    /// Reject settings the tracker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "flush_interval".to_string(),
                value: self.flush_interval,
            });
        }
        if self.persist_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "persist_interval".to_string(),
                value: self.persist_interval,
            });
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "endpoint".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn with_beacon(mut self, enabled: bool) -> Self {
        self.beacon_enabled = enabled;
        self
    }
}

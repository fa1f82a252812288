//! API Configuration Module
//!
//! CORS, cache administration and admin-role settings. Configuration is
//! loaded from environment variables with sensible defaults for development.

use crate::constants::{DEFAULT_CACHE_ADMIN_SECRET, DEFAULT_CORS_MAX_AGE_SECS};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS and administrative access.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Administration
    // ========================================================================
    /// Shared secret required by cache administration actions.
    pub cache_admin_secret: String,

    /// Usernames allowed to moderate works.
    pub admin_users: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            cache_admin_secret: DEFAULT_CACHE_ADMIN_SECRET.to_string(),
            admin_users: Vec::new(),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SHOWCASE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `SHOWCASE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `SHOWCASE_CACHE_ADMIN_SECRET`: Cache admin secret (default: "admin-secret-key")
    /// - `SHOWCASE_ADMIN_USERS`: Comma-separated admin usernames
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("SHOWCASE_CORS_ORIGINS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("SHOWCASE_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        let cache_admin_secret = std::env::var("SHOWCASE_CACHE_ADMIN_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CACHE_ADMIN_SECRET.to_string());

        if cache_admin_secret == DEFAULT_CACHE_ADMIN_SECRET {
            tracing::warn!("SHOWCASE_CACHE_ADMIN_SECRET not set, using the default secret");
        }

        let admin_users = std::env::var("SHOWCASE_ADMIN_USERS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_max_age_secs,
            cache_admin_secret,
            admin_users,
        }
    }

    /// Builder: replace the cache admin secret.
    pub fn with_cache_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.cache_admin_secret = secret.into();
        self
    }

    /// Builder: add an admin username.
    pub fn with_admin_user(mut self, username: impl Into<String>) -> Self {
        self.admin_users.push(username.into());
        self
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Whether `username` is on the configured admin list.
    pub fn is_admin(&self, username: Option<&str>) -> bool {
        match username {
            Some(name) if !name.is_empty() => self.admin_users.iter().any(|admin| admin == name),
            _ => false,
        }
    }

    /// Whether `secret` matches the cache admin secret.
    pub fn is_cache_admin_secret(&self, secret: Option<&str>) -> bool {
        secret == Some(self.cache_admin_secret.as_str())
    }
}

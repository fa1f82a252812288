//! Constants for the Showcase API
//!
//! Centralized values used by the route handlers and configuration.

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// CACHE ADMINISTRATION
// ============================================================================

/// Shared secret accepted by `POST /api/cache` when none is configured.
pub const DEFAULT_CACHE_ADMIN_SECRET: &str = "admin-secret-key";

/// Header naming the acting admin user on moderation routes.
pub const ADMIN_USER_HEADER: &str = "x-admin-user";

// ============================================================================
// WORKS FEED
// ============================================================================

/// Edge caching policy for feed responses.
pub const WORKS_CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=600";

/// Response header echoing the cache key used for a feed page.
pub const CACHE_KEY_HEADER: &str = "x-cache-key";

/// Response header reporting whether the feed page came from cache.
pub const CACHE_HIT_HEADER: &str = "x-cache-hit";

// ============================================================================
// BATCH OPERATIONS
// ============================================================================

/// Maximum number of work ids applied from a single view batch
pub const MAX_BATCH_ITEMS: usize = 100;

/// Upper bound on a view batch request body (bytes)
pub const MAX_BATCH_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

//! Per-entry cache options and the named presets used by the API.

use std::time::Duration;

/// Default entry TTL when none is given (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Cache-wide configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to entries inserted without an explicit TTL.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment.
    ///
    /// - `SHOWCASE_CACHE_DEFAULT_TTL_SECS`: default entry TTL (default: 300)
    pub fn from_env() -> Self {
        let default_ttl = std::env::var("SHOWCASE_CACHE_DEFAULT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);
        Self { default_ttl }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Options attached to a single `set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Time to live. `None` or zero means "use the cache default".
    pub ttl: Option<Duration>,
    /// Labels used for bulk invalidation.
    pub tags: Vec<String>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl_secs(secs: u64) -> Self {
        Self {
            ttl: Some(Duration::from_secs(secs)),
            tags: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Resolve the effective TTL against a default.
    pub fn effective_ttl(&self, default: Duration) -> Duration {
        match self.ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => default,
        }
    }
}

/// Named TTL/tag presets for the gallery's cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePreset {
    /// Feed pages: 5 minutes, tag `works`.
    WorksList,
    /// Per-user stats: 15 minutes, tag `stats`.
    UserStats,
}

impl CachePreset {
    pub fn ttl(&self) -> Duration {
        match self {
            CachePreset::WorksList => Duration::from_secs(300),
            CachePreset::UserStats => Duration::from_secs(900),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            CachePreset::WorksList => "works",
            CachePreset::UserStats => "stats",
        }
    }

    pub fn options(&self) -> CacheOptions {
        CacheOptions::new().with_ttl(self.ttl()).with_tag(self.tag())
    }
}

//! Showcase Core - Entity Types
//!
//! Pure data structures shared by every other crate: the gallery's works,
//! the list query that drives the feed, pagination bookkeeping and the
//! error taxonomy. No I/O lives here.

pub mod error;

pub use error::{
    BackendError, ConfigError, DeliveryError, PersistError, ShowcaseError, ShowcaseResult,
    ValidationError,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Work identifier. The hosted backend hands these out as strings.
pub type WorkId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new timestamp-sortable work id.
pub fn new_work_id() -> WorkId {
    Uuid::now_v7().to_string()
}

// ============================================================================
// LIMITS
// ============================================================================

/// Default page size for the works feed.
pub const DEFAULT_PAGE_LIMIT: u32 = 12;

/// Maximum page size a client may request.
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Maximum accepted length of a work id in view batches.
pub const MAX_WORK_ID_LEN: usize = 100;

// ============================================================================
// WORKS
// ============================================================================

/// A published (or pending) gallery entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub id: WorkId,
    pub title: String,
    pub description: Option<String>,
    /// Link to a live demo.
    pub url: Option<String>,
    pub source_code_url: Option<String>,
    pub source_repo_url: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub views: u64,
    pub likes: u64,
    pub is_approved: bool,
    pub uploaded_by: Option<String>,
    pub created_at: Timestamp,
}

/// Payload for uploading a new work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWork {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub source_code_url: Option<String>,
    #[serde(default)]
    pub source_repo_url: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

impl NewWork {
    /// Check the fields every upload must carry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "title".to_string(),
            });
        }
        if self.author.as_deref().map_or(true, |a| a.trim().is_empty()) {
            return Err(ValidationError::RequiredFieldMissing {
                field: "author".to_string(),
            });
        }
        Ok(())
    }

    /// Materialize the work as the backend would store it: unapproved,
    /// zero counters, fresh id.
    pub fn into_work(self, created_at: Timestamp) -> Work {
        Work {
            id: new_work_id(),
            title: self.title,
            description: Some(self.description.unwrap_or_default()),
            url: self.url,
            source_code_url: self.source_code_url,
            source_repo_url: self.source_repo_url,
            thumbnail: self.thumbnail,
            tags: self.tags,
            author: self.author,
            views: 0,
            likes: 0,
            is_approved: false,
            uploaded_by: self.uploaded_by,
            created_at,
        }
    }
}

// ============================================================================
// FEED QUERY
// ============================================================================

/// Feed ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Latest,
    Views,
    Likes,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Latest => "latest",
            SortBy::Views => "views",
            SortBy::Likes => "likes",
        }
    }

    /// Lenient parse: anything unrecognized falls back to `Latest`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw {
            "views" => SortBy::Views,
            "likes" => SortBy::Likes,
            _ => SortBy::Latest,
        }
    }
}

/// Raw query-string parameters as they arrive over HTTP.
///
/// Numbers stay strings so that garbage input degrades to defaults instead
/// of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorksParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub sort_by: Option<String>,
    pub min_views: Option<String>,
    pub min_likes: Option<String>,
}

/// Normalized feed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub sort_by: SortBy,
    pub min_views: u64,
    pub min_likes: u64,
}

impl Default for WorksQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            search: None,
            tag: None,
            author: None,
            sort_by: SortBy::Latest,
            min_views: 0,
            min_likes: 0,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl WorksQuery {
    /// Normalize raw parameters: defaults for missing or unparsable numbers,
    /// page at least 1, limit clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn from_params(raw: RawWorksParams) -> Self {
        let page = raw
            .page
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);
        let limit = raw
            .limit
            .and_then(|l| l.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);

        Self {
            page,
            limit,
            search: non_empty(raw.search),
            tag: non_empty(raw.tag),
            author: non_empty(raw.author),
            sort_by: raw
                .sort_by
                .as_deref()
                .map(SortBy::parse_lenient)
                .unwrap_or_default(),
            min_views: raw
                .min_views
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            min_likes: raw
                .min_likes
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        }
    }

    /// Zero-based row offset of the first work on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Deterministic cache key covering every parameter.
    pub fn cache_key(&self) -> String {
        let mut params = BTreeMap::new();
        params.insert("page", serde_json::json!(self.page));
        params.insert("limit", serde_json::json!(self.limit));
        params.insert("search", serde_json::json!(self.search));
        params.insert("tag", serde_json::json!(self.tag));
        params.insert("author", serde_json::json!(self.author));
        params.insert("sortBy", serde_json::json!(self.sort_by.as_str()));
        params.insert("minViews", serde_json::json!(self.min_views));
        params.insert("minLikes", serde_json::json!(self.min_likes));
        create_cache_key("works_list", &params)
    }

    /// Whether a work passes every filter of this query.
    pub fn matches(&self, work: &Work) -> bool {
        if !work.is_approved {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = |field: Option<&str>| {
                field.is_some_and(|f| f.to_lowercase().contains(&needle))
            };
            if !(hit(Some(&work.title)) || hit(work.description.as_deref()) || hit(work.author.as_deref())) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !work.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(author) = &self.author {
            let needle = author.to_lowercase();
            if !work
                .author
                .as_deref()
                .is_some_and(|a| a.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        work.views >= self.min_views && work.likes >= self.min_likes
    }
}

/// Build a cache key from a prefix and named parameters.
///
/// Parameters are emitted in name order as `name:json` pairs joined by `|`,
/// so two maps with the same contents always produce the same key.
pub fn create_cache_key(prefix: &str, params: &BTreeMap<&str, serde_json::Value>) -> String {
    let joined = params
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value))
        .collect::<Vec<_>>()
        .join("|");
    format!("{}:{}", prefix, joined)
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Pagination block returned alongside a page of works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
}

impl Pagination {
    /// Compute pagination for a page that returned `returned` rows out of
    /// `total` matching rows.
    pub fn for_page(query: &WorksQuery, returned: usize, total: Option<u64>) -> Self {
        let total = total.unwrap_or(0);
        let has_more = total > 0 && query.offset() + (returned as u64) < total;
        Self {
            page: query.page,
            limit: query.limit,
            total,
            has_more,
        }
    }
}

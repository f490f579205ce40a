//! Caller-facing query options

use super::search::SortOrder;
use crate::config::CacheConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

pub const DEFAULT_CACHE_TTL_MILLIS: u64 = 300_000;
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_CACHE_NAMESPACE: &str = "query";

/// Options accepted alongside a base query.
///
/// Deserializes from the camelCase JSON shape route handlers receive, e.g.
/// `{"page": 2, "limit": 10, "sortBy": "title", "sortOrder": "asc"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOptions {
    pub use_cache: bool,
    #[serde(rename = "cacheTTLMillis", alias = "cacheTtlMillis")]
    #[validate(range(min = 1))]
    pub cache_ttl_millis: u64,
    #[validate(range(min = 1))]
    pub page: u32,
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    /// Key prefix for cached results; writers invalidate by this prefix.
    #[validate(length(min = 1, max = 64))]
    pub cache_namespace: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_ttl_millis: DEFAULT_CACHE_TTL_MILLIS,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            sort_by: None,
            sort_order: SortOrder::Desc,
            cache_namespace: None,
        }
    }
}

impl QueryOptions {
    /// Defaults seeded from the cache section of the configuration.
    pub fn from_cache_config(config: &CacheConfig) -> Self {
        Self {
            use_cache: config.enabled,
            cache_ttl_millis: config.default_ttl_millis,
            ..Self::default()
        }
    }

    /// Check the option schema (page >= 1, limit in 1..=100, ...).
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_millis)
    }

    pub fn namespace(&self) -> &str {
        self.cache_namespace
            .as_deref()
            .unwrap_or(DEFAULT_CACHE_NAMESPACE)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = Some(namespace.into());
        self
    }

    pub fn with_sort(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = order;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Clamp page/limit into the accepted range instead of rejecting.
    pub fn clamped(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }
}

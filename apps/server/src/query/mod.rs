//! Query construction and paginated execution
//!
//! - [`options`]: caller-facing options (cache, ttl, page, limit, sort)
//! - [`search`]: catalog search builder with an allow-listed sort
//! - [`paginate`]: data/count variants and the cache-aware [`Paginator`]

mod clause;
pub mod options;
pub mod paginate;
pub mod search;

pub use options::{QueryOptions, DEFAULT_CACHE_TTL_MILLIS, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use paginate::{PageEnvelope, PaginatedQuery, Paginator};
pub use search::{build_search, SearchFilters, SearchQuery, SortColumn, SortOrder, SortSpec};

//! Offset pagination with cache-aware total counts
//!
//! A base `SELECT` is turned into two statements:
//! - a data query: the base plus `LIMIT ? OFFSET ?`
//! - a count query: either the base with its select list replaced by
//!   `COUNT(*) AS total`, or, when the base groups or deduplicates rows,
//!   `SELECT COUNT(*) AS total FROM (<base>) AS _sub`
//!
//! A trailing `ORDER BY` is dropped from the count query together with any
//! parameters it binds. Both statements are looked up in the result cache
//! first and whatever misses runs concurrently.

use super::clause::{self, ClauseMap};
use super::options::QueryOptions;
use crate::cache::{compute_key, ResultCache};
use crate::db::dialect::placeholder_count;
use crate::db::traits::returns_rows;
use crate::db::{Dialect, QueryExecutor, QueryResult, Row, SqlValue};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::instrument;

/// One page of rows plus the metadata needed to render paging controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope {
    pub items: Vec<Row>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl PageEnvelope {
    pub fn new(items: Vec<Row>, total: u64, page: u32, limit: u32) -> Self {
        let has_more = u64::from(page) * u64::from(limit) < total;
        let items = if total == 0 { Vec::new() } else { items };
        Self {
            items,
            total,
            page,
            limit,
            has_more,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Data and count variants derived from one base query.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedQuery {
    pub data_sql: String,
    pub data_params: Vec<SqlValue>,
    pub count_sql: String,
    pub count_params: Vec<SqlValue>,
    pub page: u32,
    pub limit: u32,
    pub offset: u64,
}

impl PaginatedQuery {
    /// Build both variants, lexing literals the way `dialect` reads them.
    ///
    /// The base query must not carry its own `LIMIT`. Page and limit are
    /// trusted to be validated upstream, but a zero value is still rejected.
    pub fn build(
        dialect: Dialect,
        base_query: &str,
        base_params: &[SqlValue],
        page: u32,
        limit: u32,
    ) -> Result<Self> {
        if limit < 1 {
            return Err(Error::InvalidPagination(
                "limit must be at least 1".to_string(),
            ));
        }
        if page < 1 {
            return Err(Error::InvalidPagination(
                "page must be at least 1".to_string(),
            ));
        }

        let base = clause::normalize(base_query);
        let map = ClauseMap::scan(base, dialect)?;
        if map.has_limit() {
            return Err(Error::InvalidPagination(
                "base query already contains a LIMIT clause".to_string(),
            ));
        }
        let expected = placeholder_count(base, dialect)?;
        if expected != base_params.len() {
            return Err(Error::ParameterMismatch {
                expected,
                actual: base_params.len(),
            });
        }

        let offset = u64::from(page - 1) * u64::from(limit);
        let data_sql = format!("{base} LIMIT ? OFFSET ?");
        let mut data_params = Vec::with_capacity(base_params.len() + 2);
        data_params.extend_from_slice(base_params);
        data_params.push(SqlValue::Int(i64::from(limit)));
        data_params.push(SqlValue::Int(i64::try_from(offset).map_err(|_| {
            Error::InvalidPagination("offset out of range".to_string())
        })?));

        // Ordering is irrelevant to a count.
        let (body, trailing) = match map.trailing_order_by() {
            Some(pos) => (base[..pos].trim_end(), placeholder_count(&base[pos..], dialect)?),
            None => (base, 0),
        };

        let (count_sql, leading) = match map.from_start() {
            Some(from) if from < body.len() && !map.needs_wrapped_count() => (
                format!("SELECT COUNT(*) AS total {}", &body[from..]),
                placeholder_count(&body[..from], dialect)?,
            ),
            _ => (
                format!("SELECT COUNT(*) AS total FROM ({body}) AS _sub"),
                0,
            ),
        };
        let count_params = base_params[leading..base_params.len() - trailing].to_vec();

        Ok(Self {
            data_sql,
            data_params,
            count_sql,
            count_params,
            page,
            limit,
            offset,
        })
    }
}

/// Runs paginated and cached reads on top of the executor.
#[derive(Debug, Clone)]
pub struct Paginator {
    executor: QueryExecutor,
    cache: Arc<ResultCache>,
    cache_enabled: bool,
}

impl Paginator {
    pub fn new(executor: QueryExecutor, cache: Arc<ResultCache>) -> Self {
        Self {
            executor,
            cache,
            cache_enabled: true,
        }
    }

    /// Globally disable caching regardless of per-call options.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    fn caching(&self, options: &QueryOptions) -> bool {
        self.cache_enabled && options.use_cache
    }

    /// Fetch one page of `base_query` and the total number of matching rows.
    ///
    /// Fails as a whole if either the data or the count statement fails; in
    /// that case nothing is written to the cache. Results are also not
    /// written back when the cache was invalidated while they were in flight.
    #[instrument(skip_all, fields(page = options.page, limit = options.limit, namespace = options.namespace()))]
    pub async fn paginate(
        &self,
        base_query: &str,
        base_params: &[SqlValue],
        options: &QueryOptions,
    ) -> Result<PageEnvelope> {
        let plan = PaginatedQuery::build(
            self.executor.dialect(),
            base_query,
            base_params,
            options.page,
            options.limit,
        )?;

        let keys = self.caching(options).then(|| {
            (
                compute_key(&plan.data_sql, &plan.data_params, options),
                compute_key(&plan.count_sql, &plan.count_params, options),
            )
        });
        let generation = self.cache.generation();
        let (cached_data, cached_count) = match &keys {
            Some((data_key, count_key)) => {
                (self.cache.get(data_key).await, self.cache.get(count_key).await)
            }
            None => (None, None),
        };

        let ((data, data_fresh), (count, count_fresh)) = tokio::try_join!(
            self.resolve(cached_data, &plan.data_sql, &plan.data_params),
            self.resolve(cached_count, &plan.count_sql, &plan.count_params),
        )?;
        let total = extract_total(&count)?;

        if let Some((data_key, count_key)) = keys {
            if data_fresh {
                self.store(data_key, &data, options, generation).await;
            }
            if count_fresh {
                self.store(count_key, &count, options, generation).await;
            }
        }

        tracing::debug!(
            total,
            data_cached = !data_fresh,
            count_cached = !count_fresh,
            "Page assembled"
        );
        Ok(PageEnvelope::new(
            data.rows.clone(),
            total,
            plan.page,
            plan.limit,
        ))
    }

    /// Execute a read through the cache without pagination.
    ///
    /// Statements that do not return rows are never cached. A result read
    /// across an invalidation is returned but not stored.
    pub async fn execute_cached(
        &self,
        sql: &str,
        params: &[SqlValue],
        options: &QueryOptions,
    ) -> Result<Arc<QueryResult>> {
        if !self.caching(options) || !returns_rows(sql, self.executor.dialect()) {
            return Ok(Arc::new(self.executor.execute(sql, params).await?));
        }

        let key = compute_key(sql, params, options);
        let generation = self.cache.generation();
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }
        let fresh = Arc::new(self.executor.execute(sql, params).await?);
        self.store(key, &fresh, options, generation).await;
        Ok(fresh)
    }

    async fn store(&self, key: String, value: &Arc<QueryResult>, options: &QueryOptions, generation: u64) {
        if !self
            .cache
            .put_if_generation(key, value.clone(), options.ttl(), generation)
            .await
        {
            tracing::debug!(generation, "Cache invalidated mid-flight; result not stored");
        }
    }

    async fn resolve(
        &self,
        cached: Option<Arc<QueryResult>>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<(Arc<QueryResult>, bool)> {
        match cached {
            Some(hit) => Ok((hit, false)),
            None => Ok((Arc::new(self.executor.execute(sql, params).await?), true)),
        }
    }
}

/// Read `total` from the first row of a count result.
///
/// Some drivers return `COUNT(*)` as a numeric string; no row means zero.
fn extract_total(result: &QueryResult) -> Result<u64> {
    let Some(row) = result.first() else {
        return Ok(0);
    };
    let value = row.get("total").or_else(|| row.values().next());
    let invalid = |v: &JsonValue| Error::Internal(format!("count query returned non-numeric total: {v}"));

    match value {
        None | Some(JsonValue::Null) => Ok(0),
        Some(v @ JsonValue::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| invalid(v)),
        Some(v @ JsonValue::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid(v)),
        Some(v) => Err(invalid(v)),
    }
}

//! Audio catalog service
//!
//! Listing, search and upload bookkeeping for the `audios` table, built on
//! the paginator. Every read is cached under the [`AUDIO_CACHE_NAMESPACE`]
//! prefix so that a single prefix invalidation after an upload drops them all.

use crate::db::{interval_expression, QueryResult, SqlValue};
use crate::query::{build_search, PageEnvelope, Paginator, QueryOptions, SearchFilters, SortSpec};
use crate::{params, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

pub const AUDIO_CACHE_NAMESPACE: &str = "audios";

const LIST_COLUMNS: &str = "id, title, description, speaker, category, status, created_at";

const CATEGORY_COUNTS: &str =
    "SELECT category, COUNT(*) AS total FROM audios WHERE status = ? GROUP BY category ORDER BY category";

fn default_status() -> String {
    "draft".to_string()
}

/// Metadata for a newly uploaded recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAudio {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub speaker: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default = "default_status")]
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    /// Length in seconds.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration: Option<i64>,
}

/// Read and write paths for audio metadata.
#[derive(Debug, Clone)]
pub struct AudioCatalog {
    paginator: Paginator,
}

impl AudioCatalog {
    pub fn new(paginator: Paginator) -> Self {
        Self { paginator }
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    /// Force the catalog namespace and reject out-of-range options.
    fn scoped(options: &QueryOptions) -> Result<QueryOptions> {
        options
            .clone()
            .with_namespace(AUDIO_CACHE_NAMESPACE)
            .validated()
    }

    fn order_by(options: &QueryOptions) -> Result<String> {
        let sort = SortSpec::from_options(options);
        let column = sort.column()?;
        Ok(format!(
            "ORDER BY {} {}, id ASC",
            column.as_str(),
            sort.order.as_sql()
        ))
    }

    /// One page of recordings filed under `subject`.
    #[instrument(skip(self, options), fields(page = options.page, limit = options.limit))]
    pub async fn list_by_subject(&self, subject: &str, options: &QueryOptions) -> Result<PageEnvelope> {
        let options = Self::scoped(options)?;
        let sql = format!(
            "SELECT {LIST_COLUMNS} FROM audios WHERE subject = ? {}",
            Self::order_by(&options)?
        );
        self.paginator
            .paginate(&sql, &params![subject], &options)
            .await
    }

    /// Filtered full-text search, most relevant first.
    #[instrument(skip_all, fields(page = options.page, limit = options.limit))]
    pub async fn search(&self, filters: &SearchFilters, options: &QueryOptions) -> Result<PageEnvelope> {
        let options = Self::scoped(options)?;
        let query = build_search(filters, &SortSpec::from_options(&options))?;
        self.paginator
            .paginate(&query.base_query, &query.base_params, &options)
            .await
    }

    /// Recordings created within the last `days` days.
    #[instrument(skip(self, options), fields(page = options.page, limit = options.limit))]
    pub async fn list_recent(&self, days: u32, options: &QueryOptions) -> Result<PageEnvelope> {
        let options = Self::scoped(options)?;
        let since = interval_expression(days, self.paginator.executor().dialect());
        let sql = format!(
            "SELECT {LIST_COLUMNS} FROM audios WHERE created_at >= {since} {}",
            Self::order_by(&options)?
        );
        self.paginator.paginate(&sql, &[], &options).await
    }

    /// Number of recordings per category with the given status.
    pub async fn category_counts(&self, status: &str, options: &QueryOptions) -> Result<Arc<QueryResult>> {
        let options = Self::scoped(options)?;
        self.paginator
            .execute_cached(CATEGORY_COUNTS, &params![status], &options)
            .await
    }

    /// Insert a recording and drop every cached catalog read.
    ///
    /// Reads still in flight when the invalidation lands return their rows
    /// but do not cache them. Returns the number of inserted rows.
    #[instrument(skip_all, fields(title = %audio.title))]
    pub async fn record_upload(&self, audio: &NewAudio) -> Result<u64> {
        audio.validate()?;
        let mut columns = vec!["title", "speaker", "category", "status"];
        let mut params: Vec<SqlValue> = params![
            audio.title.as_str(),
            audio.speaker.as_str(),
            audio.category.as_str(),
            audio.status.as_str(),
        ];
        // Absent optionals are left to column defaults; a typed NULL bind
        // would be rejected by PostgreSQL for non-text columns.
        let optional = [
            ("description", audio.description.clone().map(SqlValue::from)),
            ("subject", audio.subject.clone().map(SqlValue::from)),
            ("duration", audio.duration.map(SqlValue::from)),
        ];
        for (column, value) in optional {
            if let Some(value) = value {
                columns.push(column);
                params.push(value);
            }
        }

        let sql = format!(
            "INSERT INTO audios ({}) VALUES ({})",
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let result = self.paginator.executor().execute(&sql, &params).await?;

        let prefix = format!("{AUDIO_CACHE_NAMESPACE}:");
        let invalidated = self.paginator.cache().invalidate_prefix(&prefix).await;
        tracing::info!(
            inserted = result.row_count,
            invalidated,
            "Recorded audio upload"
        );
        Ok(result.row_count)
    }
}

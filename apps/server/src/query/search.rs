//! Search query builder for the audio catalog
//!
//! Produces a base query plus positional parameters for the paginator.
//! Filter fragments are appended in a fixed order so that the same logical
//! filter set always yields byte-identical SQL and therefore the same cache
//! key. The sort column is the only value interpolated into SQL text and is
//! restricted to [`SortColumn`].

use super::options::QueryOptions;
use crate::db::SqlValue;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

const SEARCH_BASE: &str =
    "SELECT id, title, description, speaker, category, status, created_at FROM audios WHERE 1 = 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::Validation(format!(
                "sortOrder must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

/// Columns a caller may sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortColumn {
    #[default]
    CreatedAt,
    Title,
    Speaker,
    Category,
    PlayCount,
    Duration,
}

impl SortColumn {
    pub const ALL: [SortColumn; 6] = [
        Self::CreatedAt,
        Self::Title,
        Self::Speaker,
        Self::Category,
        Self::PlayCount,
        Self::Duration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Title => "title",
            Self::Speaker => "speaker",
            Self::Category => "category",
            Self::PlayCount => "play_count",
            Self::Duration => "duration",
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = Error;

    /// Exact, case-sensitive match against the allow-list.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| Error::InvalidSortColumn(s.to_string()))
    }
}

/// Requested ordering before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub sort_by: Option<String>,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(sort_by: Option<String>, order: SortOrder) -> Self {
        Self { sort_by, order }
    }

    pub fn from_options(options: &QueryOptions) -> Self {
        Self::new(options.sort_by.clone(), options.sort_order)
    }

    /// Resolve against the allow-list; no column means `created_at`.
    pub fn column(&self) -> Result<SortColumn> {
        match self.sort_by.as_deref() {
            None => Ok(SortColumn::default()),
            Some(name) => name.parse(),
        }
    }
}

/// Optional search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    #[validate(length(max = 200))]
    pub query: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub speaker: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl SearchFilters {
    /// Build filters from query-string pairs, in any order.
    ///
    /// Empty values are treated as absent. Unknown keys and malformed dates
    /// are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "query" | "q" => &mut filters.query,
                "category" => &mut filters.category,
                "speaker" => &mut filters.speaker,
                "status" => &mut filters.status,
                "dateFrom" => {
                    filters.date_from = Some(parse_date("dateFrom", value)?);
                    continue;
                }
                "dateTo" => {
                    filters.date_to = Some(parse_date("dateTo", value)?);
                    continue;
                }
                other => {
                    return Err(Error::Validation(format!(
                        "unknown search filter '{other}'"
                    )))
                }
            };
            *slot = Some(value.to_string());
        }
        Ok(filters)
    }

    fn text_query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("{field} must be YYYY-MM-DD: {e}")))
}

/// Base query and parameters ready for pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub base_query: String,
    pub base_params: Vec<SqlValue>,
}

/// Build the catalog search query.
///
/// The sort column is checked before any SQL is assembled.
pub fn build_search(filters: &SearchFilters, sort: &SortSpec) -> Result<SearchQuery> {
    let column = sort.column()?;
    filters.validate()?;
    if let (Some(from), Some(to)) = (filters.date_from, filters.date_to) {
        if from > to {
            return Err(Error::Validation(format!(
                "dateFrom {from} is after dateTo {to}"
            )));
        }
    }

    let mut sql = String::from(SEARCH_BASE);
    let mut params = Vec::new();

    let equals = [
        ("category", &filters.category),
        ("speaker", &filters.speaker),
        ("status", &filters.status),
    ];
    for (name, value) in equals {
        if let Some(value) = value {
            sql.push_str(&format!(" AND {name} = ?"));
            params.push(SqlValue::from(value));
        }
    }
    // Postgres binds text parameters, so the comparison needs an explicit cast.
    if let Some(from) = filters.date_from {
        sql.push_str(" AND created_at >= CAST(? AS DATE)");
        params.push(SqlValue::Text(from.to_string()));
    }
    if let Some(to) = filters.date_to {
        sql.push_str(" AND created_at <= CAST(? AS DATE)");
        params.push(SqlValue::Text(to.to_string()));
    }

    let mut order_by = Vec::with_capacity(3);
    if let Some(query) = filters.text_query() {
        let escaped = escape_like(query);
        let contains = format!("%{escaped}%");
        sql.push_str(" AND (title LIKE ? OR description LIKE ? OR speaker LIKE ?)");
        params.extend(std::iter::repeat(SqlValue::Text(contains.clone())).take(3));

        order_by.push(
            "CASE WHEN title = ? THEN 0 WHEN title LIKE ? THEN 1 WHEN title LIKE ? THEN 2 ELSE 3 END"
                .to_string(),
        );
        params.push(SqlValue::Text(query.to_string()));
        params.push(SqlValue::Text(format!("{escaped}%")));
        params.push(SqlValue::Text(contains));
    }
    order_by.push(format!("{} {}", column.as_str(), sort.order.as_sql()));
    if column != SortColumn::CreatedAt {
        order_by.push(format!("created_at {}", SortOrder::Desc.as_sql()));
    }
    order_by.push("id ASC".to_string());

    sql.push_str(" ORDER BY ");
    sql.push_str(&order_by.join(", "));

    tracing::debug!(
        sort = column.as_str(),
        order = sort.order.as_sql(),
        params = params.len(),
        "Built search query"
    );
    Ok(SearchQuery {
        base_query: sql,
        base_params: params,
    })
}

/// Escape LIKE wildcards; backslash is the default escape in both dialects.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

//! Core traits for relational backends

use super::dialect::{segments, Dialect, SegmentKind};
use super::value::{QueryResult, SqlValue};
use crate::Result;
use async_trait::async_trait;

/// A relational backend capable of running one parameterized statement.
///
/// Implementations receive SQL that has already been rewritten for their
/// [`Dialect`] and a parameter list whose length matches the placeholders.
/// They must not cache or retry.
#[async_trait]
pub trait QueryBackend: Send + Sync + std::fmt::Debug {
    /// Placeholder/syntax convention this backend expects.
    fn dialect(&self) -> Dialect;

    /// Run a statement and return rows (or the affected-row count).
    ///
    /// # Errors
    /// * `Query` - syntax error, constraint violation, lost connection, ...
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult>;

    /// Release pooled connections. The backend must not be used afterwards.
    async fn close(&self) {}
}

/// Whether a statement produces a result set rather than an affected-row count.
///
/// Only code is inspected: leading comments are skipped and keywords inside
/// literals or quoted identifiers do not count.
pub fn returns_rows(sql: &str, dialect: Dialect) -> bool {
    let code: Vec<&str> = match segments(sql, dialect) {
        Ok(segments) => segments
            .iter()
            .filter(|segment| segment.kind == SegmentKind::Code)
            .map(|segment| &sql[segment.start..segment.end])
            .collect(),
        Err(_) => vec![sql],
    };
    let mut words = code.into_iter().flat_map(|text| {
        text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|word| !word.is_empty())
    });

    let Some(head) = words.next() else {
        return false;
    };
    matches!(
        head.to_ascii_uppercase().as_str(),
        "SELECT" | "WITH" | "SHOW" | "VALUES" | "EXPLAIN" | "DESCRIBE" | "TABLE"
    ) || words.any(|word| word.eq_ignore_ascii_case("RETURNING"))
}

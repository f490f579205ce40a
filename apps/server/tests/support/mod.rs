pub mod fixtures;

use async_trait::async_trait;
use soundshelf::cache::ResultCache;
use soundshelf::db::{Dialect, QueryBackend, QueryExecutor, QueryResult, Row, SqlValue};
use soundshelf::query::Paginator;
use soundshelf::services::AudioCatalog;
use soundshelf::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub use fixtures::*;

/// One statement as the backend received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl RecordedCall {
    pub fn is_count(&self) -> bool {
        self.sql.starts_with("SELECT COUNT(*)")
    }
}

/// In-memory backend that treats its rows as the full match set.
///
/// - `SELECT COUNT(*) ...` returns `[{total: n}]`
/// - a statement ending in `LIMIT ? OFFSET ?` returns the matching slice
/// - `INSERT` appends a row built from the bound title and reports 1
/// - anything else returns every row
#[derive(Debug)]
pub struct ScriptedBackend {
    dialect: Dialect,
    rows: Mutex<Vec<Row>>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_counts: AtomicBool,
    fail_data: AtomicBool,
    count_as_text: AtomicBool,
}

impl ScriptedBackend {
    pub fn new(dialect: Dialect, rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            rows: Mutex::new(rows),
            calls: Mutex::new(Vec::new()),
            fail_counts: AtomicBool::new(false),
            fail_data: AtomicBool::new(false),
            count_as_text: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_fail_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_data(&self, fail: bool) {
        self.fail_data.store(fail, Ordering::SeqCst);
    }

    /// Report `COUNT(*)` as a numeric string, as some drivers do.
    pub fn set_count_as_text(&self, as_text: bool) {
        self.count_as_text.store(as_text, Ordering::SeqCst);
    }

    fn failure(&self, message: &str) -> Error {
        Error::Query {
            dialect: self.dialect,
            message: message.to_string(),
            code: None,
        }
    }
}

fn as_index(value: Option<&SqlValue>) -> usize {
    match value {
        Some(SqlValue::Int(i)) => usize::try_from(*i).unwrap_or(0),
        _ => 0,
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        self.calls.lock().unwrap().push(RecordedCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        // Let the sibling query of a paginate call start before this one finishes.
        tokio::task::yield_now().await;

        if sql.starts_with("SELECT COUNT(*)") {
            if self.fail_counts.load(Ordering::SeqCst) {
                return Err(self.failure("canceling statement due to statement timeout"));
            }
            let total = self.rows.lock().unwrap().len();
            let mut row = Row::new();
            if self.count_as_text.load(Ordering::SeqCst) {
                row.insert("total".into(), total.to_string().into());
            } else {
                row.insert("total".into(), (total as u64).into());
            }
            return Ok(QueryResult::from_rows(vec![row]));
        }

        if sql.starts_with("INSERT") {
            let mut row = Row::new();
            if let Some(SqlValue::Text(title)) = params.first() {
                row.insert("title".into(), title.clone().into());
            }
            self.rows.lock().unwrap().push(row);
            return Ok(QueryResult::affected(1));
        }

        if self.fail_data.load(Ordering::SeqCst) {
            return Err(self.failure("relation \"audios\" does not exist"));
        }

        let rows = self.rows.lock().unwrap().clone();
        let trimmed = sql.trim_end();
        let paged = trimmed.ends_with("LIMIT ? OFFSET ?")
            || trimmed.rsplit(" LIMIT ").next().is_some_and(|tail| tail.contains("OFFSET $"));
        if paged && params.len() >= 2 {
            let limit = as_index(params.get(params.len() - 2));
            let offset = as_index(params.last());
            let page = rows.into_iter().skip(offset).take(limit).collect();
            return Ok(QueryResult::from_rows(page));
        }
        Ok(QueryResult::from_rows(rows))
    }
}

/// A paginator over a scripted backend with a fresh cache.
pub struct TestStack {
    pub backend: Arc<ScriptedBackend>,
    pub executor: QueryExecutor,
    pub cache: Arc<ResultCache>,
    pub paginator: Paginator,
}

impl TestStack {
    pub fn new(rows: Vec<Row>) -> Self {
        Self::with_dialect(Dialect::MySql, rows)
    }

    pub fn with_dialect(dialect: Dialect, rows: Vec<Row>) -> Self {
        let backend = ScriptedBackend::new(dialect, rows);
        let executor = QueryExecutor::new(backend.clone());
        let cache = Arc::new(ResultCache::new());
        let paginator = Paginator::new(executor.clone(), cache.clone());
        Self {
            backend,
            executor,
            cache,
            paginator,
        }
    }

    pub fn catalog(&self) -> AudioCatalog {
        AudioCatalog::new(self.paginator.clone())
    }
}

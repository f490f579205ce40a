//! Single entry point for running SQL against the configured backend

use super::dialect::{self, Dialect};
use super::mysql::MySqlBackend;
use super::postgres::PostgresBackend;
use super::traits::QueryBackend;
use super::value::{QueryResult, SqlValue};
use crate::config::DatabaseConfig;
use crate::{metrics, Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Runs `?`-templated SQL on whichever backend was chosen at startup.
///
/// This is the only component that issues raw statements. It performs no
/// caching and never retries; retry policy belongs to the caller. Dropping the
/// returned future drops the driver future, which abandons the statement.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }

    /// Connect the backend named by `config.dialect`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let backend: Arc<dyn QueryBackend> = match config.dialect {
            Dialect::Postgres => Arc::new(PostgresBackend::connect(config).await?),
            Dialect::MySql => Arc::new(MySqlBackend::connect(config).await?),
        };
        Ok(Self::new(backend))
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    /// Execute a template with positional parameters.
    ///
    /// # Errors
    /// * `Translation` - the template has an unterminated quote or comment
    /// * `ParameterMismatch` - parameter count differs from placeholder count
    /// * `Query` - the backend rejected or failed the statement
    #[instrument(skip_all, fields(dialect = %self.dialect(), params = params.len()))]
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let dialect = self.dialect();
        let translated = dialect::translate_counted(sql, dialect)?;
        if translated.placeholders != params.len() {
            return Err(Error::ParameterMismatch {
                expected: translated.placeholders,
                actual: params.len(),
            });
        }

        let started = Instant::now();
        let result = self.backend.execute(&translated.sql, params).await;
        let elapsed = started.elapsed();
        metrics::record_query(dialect.as_str(), result.is_ok(), elapsed);

        match &result {
            Ok(r) => tracing::debug!(
                row_count = r.row_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "Statement executed"
            ),
            Err(e) => tracing::warn!(error = %e, sql = %translated.sql, "Statement failed"),
        }
        result
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct EchoBackend {
        dialect: Dialect,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryBackend for EchoBackend {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
            self.seen.lock().unwrap().push(sql.to_string());
            if sql.starts_with("FAIL") {
                return Err(Error::Query {
                    dialect: self.dialect,
                    message: "relation \"nope\" does not exist".into(),
                    code: Some("42P01".into()),
                });
            }
            Ok(QueryResult::affected(params.len() as u64))
        }
    }

    fn executor(dialect: Dialect) -> (QueryExecutor, Arc<EchoBackend>) {
        let backend = Arc::new(EchoBackend {
            dialect,
            seen: Mutex::new(Vec::new()),
        });
        (QueryExecutor::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn translates_before_dispatch() {
        let (exec, backend) = executor(Dialect::Postgres);
        exec.execute(
            "UPDATE audios SET title = ? WHERE id = ?",
            &[SqlValue::from("New"), SqlValue::Int(4)],
        )
        .await
        .unwrap();
        assert_eq!(
            backend.seen.lock().unwrap().as_slice(),
            ["UPDATE audios SET title = $1 WHERE id = $2"]
        );
    }

    #[tokio::test]
    async fn rejects_parameter_mismatch_without_round_trip() {
        let (exec, backend) = executor(Dialect::MySql);
        let err = exec
            .execute("SELECT * FROM audios WHERE id = ?", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ParameterMismatch {
                expected: 1,
                actual: 0
            }
        ));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn surfaces_backend_message() {
        let (exec, _backend) = executor(Dialect::Postgres);
        let err = exec.execute("FAIL SELECT 1", &[]).await.unwrap_err();
        assert!(err.to_string().contains("relation \"nope\" does not exist"));
    }

    #[tokio::test]
    async fn malformed_template_is_a_translation_error() {
        let (exec, backend) = executor(Dialect::Postgres);
        let err = exec
            .execute("SELECT * FROM audios WHERE title = 'open", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
        assert!(backend.seen.lock().unwrap().is_empty());
    }
}

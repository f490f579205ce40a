//! PostgreSQL backend

use super::dialect::Dialect;
use super::traits::{returns_rows, QueryBackend};
use super::value::{decimal_to_json, QueryResult, Row, SqlValue};
use crate::config::DatabaseConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};

/// Backend over a `sqlx` PostgreSQL pool. Expects `$n` placeholders.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized and timed out per configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let statement_timeout_ms = config.statement_timeout_seconds.saturating_mul(1000);
        let pool = PgPoolOptions::new()
            .min_connections(config.pool_min_size)
            .max_connections(config.pool_max_size)
            .acquire_timeout(config.pool_timeout())
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if statement_timeout_ms > 0 {
                        let stmt = format!("SET statement_timeout = {statement_timeout_ms}");
                        sqlx::query(&stmt).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(&config.url)
            .await
            .map_err(|e| Error::query(Dialect::Postgres, e))?;

        tracing::info!(
            max_connections = config.pool_max_size,
            "PostgreSQL pool ready"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryBackend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, value| bind_value(query, value));

        if returns_rows(sql, Dialect::Postgres) {
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::query(Dialect::Postgres, e))?;
            Ok(QueryResult::from_rows(rows.iter().map(decode_row).collect()))
        } else {
            let done = query
                .execute(&self.pool)
                .await
                .map_err(|e| Error::query(Dialect::Postgres, e))?;
            Ok(QueryResult::affected(done.rows_affected()))
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        // Untyped NULL is not expressible; TEXT is the most permissive choice.
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
    }
}

fn decode_row(row: &PgRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

fn nullable<'r, T, F>(row: &'r PgRow, idx: usize, f: F) -> std::result::Result<JsonValue, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: FnOnce(T) -> JsonValue,
{
    Ok(row.try_get::<Option<T>, _>(idx)?.map_or(JsonValue::Null, f))
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> JsonValue {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    let decoded = match type_name {
        "BOOL" => nullable(row, idx, |v: bool| JsonValue::from(v)),
        "INT2" => nullable(row, idx, |v: i16| JsonValue::from(v)),
        "INT4" => nullable(row, idx, |v: i32| JsonValue::from(v)),
        "INT8" => nullable(row, idx, |v: i64| JsonValue::from(v)),
        "FLOAT4" => nullable(row, idx, |v: f32| JsonValue::from(f64::from(v))),
        "FLOAT8" => nullable(row, idx, |v: f64| JsonValue::from(v)),
        "NUMERIC" => nullable(row, idx, decimal_to_json),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            nullable(row, idx, |v: String| JsonValue::from(v))
        }
        "TIMESTAMPTZ" => nullable(row, idx, |v: DateTime<Utc>| {
            JsonValue::from(v.to_rfc3339())
        }),
        "TIMESTAMP" => nullable(row, idx, |v: NaiveDateTime| {
            JsonValue::from(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        "DATE" => nullable(row, idx, |v: NaiveDate| JsonValue::from(v.to_string())),
        "TIME" => nullable(row, idx, |v: NaiveTime| JsonValue::from(v.to_string())),
        "JSON" | "JSONB" => nullable(row, idx, |v: JsonValue| v),
        _ => nullable(row, idx, |v: String| JsonValue::from(v)),
    };

    match decoded {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(
                column = idx,
                pg_type = type_name,
                error = %e,
                "Column type not representable, returning NULL"
            );
            JsonValue::Null
        }
    }
}

//! MySQL / MariaDB backend

use super::dialect::Dialect;
use super::traits::{returns_rows, QueryBackend};
use super::value::{decimal_to_json, QueryResult, Row, SqlValue};
use crate::config::DatabaseConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as _, TypeInfo};

/// Backend over a `sqlx` MySQL pool. Expects ordinal `?` placeholders.
#[derive(Debug, Clone)]
pub struct MySqlBackend {
    pool: MySqlPool,
}

impl MySqlBackend {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let statement_timeout_ms = config.statement_timeout_seconds.saturating_mul(1000);
        let pool = MySqlPoolOptions::new()
            .min_connections(config.pool_min_size)
            .max_connections(config.pool_max_size)
            .acquire_timeout(config.pool_timeout())
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if statement_timeout_ms > 0 {
                        // Only bounds SELECT statements; MySQL has no general equivalent.
                        let stmt = format!("SET SESSION MAX_EXECUTION_TIME = {statement_timeout_ms}");
                        sqlx::query(&stmt).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(&config.url)
            .await
            .map_err(|e| Error::query(Dialect::MySql, e))?;

        tracing::info!(max_connections = config.pool_max_size, "MySQL pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl QueryBackend for MySqlBackend {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, value| bind_value(query, value));

        if returns_rows(sql, Dialect::MySql) {
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::query(Dialect::MySql, e))?;
            Ok(QueryResult::from_rows(rows.iter().map(decode_row).collect()))
        } else {
            let done = query
                .execute(&self.pool)
                .await
                .map_err(|e| Error::query(Dialect::MySql, e))?;
            Ok(QueryResult::affected(done.rows_affected()))
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

fn nullable<'r, T, F>(
    row: &'r MySqlRow,
    idx: usize,
    f: F,
) -> std::result::Result<JsonValue, sqlx::Error>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
    F: FnOnce(T) -> JsonValue,
{
    Ok(row.try_get::<Option<T>, _>(idx)?.map_or(JsonValue::Null, f))
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> JsonValue {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    let unsigned = type_name.ends_with("UNSIGNED");
    let base = type_name.trim_end_matches(" UNSIGNED");

    let decoded = match base {
        "BOOLEAN" => nullable(row, idx, |v: bool| JsonValue::from(v)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" if unsigned => {
            nullable(row, idx, |v: u64| JsonValue::from(v))
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            nullable(row, idx, |v: i64| JsonValue::from(v))
        }
        "YEAR" => nullable(row, idx, |v: u16| JsonValue::from(v)),
        "FLOAT" => nullable(row, idx, |v: f32| JsonValue::from(f64::from(v))),
        "DOUBLE" => nullable(row, idx, |v: f64| JsonValue::from(v)),
        "DECIMAL" => nullable(row, idx, decimal_to_json),
        "DATETIME" => nullable(row, idx, |v: NaiveDateTime| {
            JsonValue::from(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        "TIMESTAMP" => nullable(row, idx, |v: DateTime<Utc>| {
            JsonValue::from(v.to_rfc3339())
        }),
        "DATE" => nullable(row, idx, |v: NaiveDate| JsonValue::from(v.to_string())),
        "TIME" => nullable(row, idx, |v: NaiveTime| JsonValue::from(v.to_string())),
        "JSON" => nullable(row, idx, |v: JsonValue| v),
        _ => nullable(row, idx, |v: String| JsonValue::from(v)),
    };

    match decoded {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(
                column = idx,
                mysql_type = type_name,
                error = %e,
                "Column type not representable, returning NULL"
            );
            JsonValue::Null
        }
    }
}

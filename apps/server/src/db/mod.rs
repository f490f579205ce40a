//! Database layer - dialects, backends and the query executor

pub mod dialect;
pub mod executor;
pub mod mysql;
pub mod postgres;
pub mod traits;
pub mod value;

pub use dialect::{interval_expression, translate, Dialect, TranslationError};
pub use executor::QueryExecutor;
pub use mysql::MySqlBackend;
pub use postgres::PostgresBackend;
pub use traits::QueryBackend;
pub use value::{QueryResult, Row, SqlValue};

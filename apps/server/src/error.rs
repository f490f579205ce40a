//! Error types for the query layer

use crate::db::dialect::{Dialect, TranslationError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed query template: {0}")]
    Translation(#[from] TranslationError),

    #[error("Query failed on {dialect}: {message}")]
    Query {
        dialect: Dialect,
        /// Backend message, preserved verbatim for diagnostics.
        message: String,
        /// SQLSTATE (or vendor error code) when the backend reported one.
        code: Option<String>,
    },

    #[error("Invalid sort column: {0}")]
    InvalidSortColumn(String),

    #[error("Parameter count mismatch: template has {expected} placeholders, got {actual} values")]
    ParameterMismatch { expected: usize, actual: usize },

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a driver error, keeping the backend's own message.
    pub fn query(dialect: Dialect, err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) => Error::Query {
                dialect,
                message: db_err.message().to_string(),
                code: db_err.code().map(|c| c.into_owned()),
            },
            None => Error::Query {
                dialect,
                message: err.to_string(),
                code: None,
            },
        }
    }

    /// Caller supplied something invalid; maps to a 4xx at the route layer.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSortColumn(_)
                | Error::ParameterMismatch { .. }
                | Error::InvalidPagination(_)
                | Error::Validation(_)
        )
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

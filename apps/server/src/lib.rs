//! soundshelf query layer
//!
//! Cross-dialect SQL execution for the audio catalog:
//! - `?` templates rewritten for PostgreSQL or MySQL at dispatch time
//! - in-memory result cache with TTL expiry and prefix invalidation
//! - offset pagination with concurrent data and count queries
//! - allow-listed search query builder

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod query;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;

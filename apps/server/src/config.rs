//! Static configuration
//!
//! Loaded once at startup from (in order of precedence, lowest first):
//! 1. Built-in defaults
//! 2. `config.{toml,yaml,json}` in the working directory, or the file named by
//!    `SOUNDSHELF_CONFIG`
//! 3. `SOUNDSHELF__<SECTION>__<KEY>` environment variables (a `.env` file is
//!    read first)
//!
//! `DATABASE_URL` is honoured when no URL was configured otherwise.

use crate::db::Dialect;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ENV_PREFIX: &str = "SOUNDSHELF";
const CONFIG_PATH_ENV: &str = "SOUNDSHELF_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Backend dialect, fixed for the lifetime of the process.
    pub dialect: Dialect,
    pub url: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
    /// Per-statement timeout applied to every pooled connection (0 = none).
    pub statement_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            url: String::new(),
            pool_min_size: 1,
            pool_max_size: 10,
            pool_timeout_seconds: 30,
            statement_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn pool_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Global switch; when off, `useCache` on individual calls is ignored.
    pub enabled: bool,
    pub default_ttl_millis: u64,
    /// Interval of the background sweep of expired entries (0 = no sweep).
    pub purge_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_millis: 300_000,
            purge_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub service_name: String,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    /// daily, hourly, minutely or never
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            service_name: "soundshelf".to_string(),
            file_enabled: false,
            file_directory: "logs".to_string(),
            file_prefix: "soundshelf".to_string(),
            file_rotation: "daily".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        // A missing .env is fine; the environment may be set up otherwise.
        let _ = dotenvy::dotenv();

        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config".to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.database.url.is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }
        Ok(config)
    }

    /// Reject inconsistent settings before anything connects.
    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        if db.url.trim().is_empty() {
            return Err(Error::Config("database.url must be set".to_string()));
        }
        if db.pool_max_size == 0 {
            return Err(Error::Config(
                "database.pool_max_size must be at least 1".to_string(),
            ));
        }
        if db.pool_min_size > db.pool_max_size {
            return Err(Error::Config(format!(
                "database.pool_min_size ({}) exceeds pool_max_size ({})",
                db.pool_min_size, db.pool_max_size
            )));
        }
        if self.cache.default_ttl_millis == 0 {
            return Err(Error::Config(
                "cache.default_ttl_millis must be positive".to_string(),
            ));
        }
        if !matches!(
            self.logging.file_rotation.as_str(),
            "daily" | "hourly" | "minutely" | "never"
        ) {
            return Err(Error::Config(format!(
                "logging.file_rotation '{}' is not one of daily, hourly, minutely, never",
                self.logging.file_rotation
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.database.url = "postgres://localhost/soundshelf".to_string();
        config
    }

    #[test]
    fn defaults_validate_once_url_is_set() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_pool_bounds() {
        let mut config = valid();
        config.database.pool_min_size = 20;
        config.database.pool_max_size = 5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_unknown_rotation() {
        let mut config = valid();
        config.logging.file_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_sections() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                "[database]\ndialect = \"mysql\"\nurl = \"mysql://localhost/audio\"\n\n[cache]\ndefault_ttl_millis = 600000\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: Config = settings.try_deserialize().unwrap();
        assert_eq!(config.database.dialect, Dialect::MySql);
        assert_eq!(config.database.pool_max_size, 10);
        assert_eq!(config.cache.default_ttl_millis, 600_000);
        assert!(config.cache.enabled);
        assert_eq!(config.logging.level, "info");
    }
}

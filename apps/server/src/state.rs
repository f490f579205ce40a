//! Process-wide shared state

use crate::cache::ResultCache;
use crate::config::Config;
use crate::db::QueryExecutor;
use crate::query::{Paginator, QueryOptions};
use crate::services::AudioCatalog;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Everything a request handler needs, cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub executor: QueryExecutor,
    pub cache: Arc<ResultCache>,
    pub paginator: Paginator,
    pub catalog: AudioCatalog,
}

impl AppState {
    /// Connect the configured backend and wire up the cache.
    ///
    /// Must be called inside a tokio runtime; the cache purge task is spawned
    /// here when `cache.purge_interval_seconds` is non-zero.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let executor = QueryExecutor::connect(&config.database).await?;
        tracing::info!(dialect = %executor.dialect(), "Database connected");
        Ok(Self::with_executor(config, executor))
    }

    /// Build state around an existing executor.
    pub fn with_executor(config: Config, executor: QueryExecutor) -> Self {
        let cache = Arc::new(ResultCache::new());
        if config.cache.purge_interval_seconds > 0 {
            cache.spawn_purge_task(Duration::from_secs(config.cache.purge_interval_seconds));
        }

        let paginator =
            Paginator::new(executor.clone(), cache.clone()).with_cache_enabled(config.cache.enabled);
        let catalog = AudioCatalog::new(paginator.clone());

        Self {
            config: Arc::new(config),
            executor,
            cache,
            paginator,
            catalog,
        }
    }

    /// Option defaults seeded from the cache configuration.
    pub fn default_options(&self) -> QueryOptions {
        QueryOptions::from_cache_config(&self.config.cache)
    }

    pub async fn shutdown(&self) {
        self.executor.close().await;
    }
}

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::{Cache, CatalogStore};
use crate::engine::{BuildSignal, IndexRegistry};

/// Query tuning shared by all handlers
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub fan_out: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    pub build_timeout: Duration,
    pub similar_cache_ttl_secs: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            fan_out: 10,
            default_limit: 10,
            max_limit: 100,
            build_timeout: Duration::from_secs(300),
            similar_cache_ttl_secs: 3600,
        }
    }
}

impl QuerySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fan_out: config.fan_out,
            default_limit: config.default_limit,
            max_limit: config.max_limit,
            build_timeout: Duration::from_secs(config.build_timeout_secs),
            similar_cache_ttl_secs: config.similar_cache_ttl_secs,
        }
    }

    /// Requested limit, defaulted and clamped to `max_limit`
    pub fn limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub registry: Arc<IndexRegistry>,
    pub cache: Option<Cache>,
    pub settings: QuerySettings,
    /// Cancelled on shutdown to abort an in-flight build
    pub build_signal: BuildSignal,
}

impl AppState {
    /// State over `store` with an empty index and no cache
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            registry: Arc::new(IndexRegistry::new()),
            cache: None,
            settings: QuerySettings::default(),
            build_signal: BuildSignal::new(),
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_settings(mut self, settings: QuerySettings) -> Self {
        self.settings = settings;
        self
    }
}

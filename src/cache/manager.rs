//! Cache manager that dispatches to the configured backend.

use std::sync::Arc;

use crate::cache::memory::MemoryCache;
use crate::cache::noop::NoOpCache;
use crate::cache::redis::RedisCache;
use crate::cache::{AppCache, CacheError, MAX_TTL_SECONDS};
use crate::config::{CacheAdapter, CacheConfig};

/// Handle to the active cache backend. Cloning shares the backend.
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn AppCache>,
}

impl CacheManager {
    /// Build the backend named by `config.adapter`.
    ///
    /// A disabled cache gets a [`NoOpCache`]; an unknown adapter name is a
    /// configuration error.
    pub async fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let adapter = config.adapter_kind()?;

        let backend: Arc<dyn AppCache> = if !config.enabled {
            Arc::new(NoOpCache)
        } else {
            match adapter {
                CacheAdapter::Memory => Arc::new(MemoryCache::new(&config.memory)),
                CacheAdapter::Redis => Arc::new(RedisCache::new(&config.redis).await?),
            }
        };

        tracing::info!(backend = backend.name(), "Cache backend initialized");

        Ok(Self { backend })
    }

    /// Wrap an already constructed backend
    pub fn with_backend(backend: Arc<dyn AppCache>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn AppCache> {
        &self.backend
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    // ========================================================================
    // AppCache proxy methods
    // ========================================================================

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.backend.get(key).await
    }

    /// Store `value`, clamping the TTL to [`MAX_TTL_SECONDS`]
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError> {
        self.backend
            .set(key, value, ttl_seconds.min(MAX_TTL_SECONDS))
            .await
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.backend.remove(key).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.backend.clear().await
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("backend", &self.backend.name())
            .finish()
    }
}

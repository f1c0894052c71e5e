//! Entry point tying configuration, cache backend and route table together.

use std::sync::Arc;

use tracing::info;

use crate::cache::CacheManager;
use crate::config::{ConfigError, InterceptorConfig, Settings};
use crate::error::AppResult;
use crate::middleware::{CacheLayer, KeyExtension};
use crate::routing::RouteTable;

/// Builds [`CacheLayer`]s that share one cache backend and one route table.
///
/// ```ignore
/// let staticize = Staticize::new(&settings).await?;
/// let app = Router::new()
///     .route("/posts/{id}", get(show_post))
///     .layer(staticize.cache_middleware(None, Some("^/admin"), None)?);
/// ```
#[derive(Debug, Clone)]
pub struct Staticize {
    cache: CacheManager,
    routes: Arc<RouteTable>,
    interceptor: InterceptorConfig,
}

impl Staticize {
    /// Connect the configured cache backend and compile the route table.
    ///
    /// # Errors
    ///
    /// Configuration errors (bad TTL, CORS value or route key, unknown
    /// adapter) and backend connection failures.
    pub async fn new(settings: &Settings) -> AppResult<Self> {
        settings.cache.validate()?;
        let cache = CacheManager::new(&settings.cache).await?;
        Self::with_cache(cache, settings)
    }

    /// Use an already built cache backend instead of the configured one
    pub fn with_cache(cache: CacheManager, settings: &Settings) -> AppResult<Self> {
        settings.interceptor.validate()?;
        let routes = RouteTable::from_config(&settings.routes)?;

        info!(
            backend = cache.name(),
            routes = routes.len(),
            "Staticize initialized"
        );

        Ok(Self {
            cache,
            routes: Arc::new(routes),
            interceptor: settings.interceptor.clone(),
        })
    }

    /// Create a caching layer.
    ///
    /// - `ttl`: cache everything behind this layer for that many seconds,
    ///   overriding the route table (`None` or `0` uses the table)
    /// - `skip`: regex; matching paths bypass the cache entirely
    /// - `key_extension`: extra segment appended to every cache key
    pub fn cache_middleware(
        &self,
        ttl: Option<u64>,
        skip: Option<&str>,
        key_extension: Option<KeyExtension>,
    ) -> Result<CacheLayer, ConfigError> {
        let mut layer = self.layer().with_key_extension(key_extension);
        if let Some(seconds) = ttl {
            layer = layer.ttl(seconds);
        }
        if let Some(pattern) = skip {
            layer = layer.skip(pattern)?;
        }
        Ok(layer)
    }

    /// A layer driven purely by the route table
    pub fn layer(&self) -> CacheLayer {
        CacheLayer::new(self.cache.clone(), Arc::clone(&self.routes), &self.interceptor)
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

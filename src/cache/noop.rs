//! NoOp cache implementation.

use async_trait::async_trait;

use crate::cache::{AppCache, CacheError};

/// Cache used when `cache.enabled = false`: stores nothing, never hits.
#[derive(Debug, Default)]
pub struct NoOpCache;

#[async_trait]
impl AppCache for NoOpCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl_seconds: u64) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

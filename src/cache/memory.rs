//! Memory cache implementation using cached::ExpiringValueCache.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cached::{CanExpire, Cached, ExpiringValueCache};

use crate::cache::{AppCache, CacheError};
use crate::config::MemoryCacheConfig;

/// Stored bytes plus the instant they stop being served. `None` means the
/// deadline lies beyond what `Instant` can represent.
#[derive(Debug, Clone)]
struct Expiring {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CanExpire for Expiring {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process cache with a size bound and a TTL per entry.
pub struct MemoryCache {
    store: Mutex<ExpiringValueCache<String, Expiring>>,
}

impl MemoryCache {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        Self {
            store: Mutex::new(ExpiringValueCache::with_size(config.max_size)),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, ExpiringValueCache<String, Expiring>>, CacheError> {
        self.store
            .lock()
            .map_err(|e| CacheError::Operation(e.to_string()))
    }
}

#[async_trait]
impl AppCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut store = self.lock()?;
        Ok(store.cache_get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError> {
        let entry = Expiring {
            value,
            expires_at: Instant::now().checked_add(Duration::from_secs(ttl_seconds)),
        };
        self.lock()?.cache_set(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.cache_remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.lock()?.cache_clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_size: usize) -> MemoryCache {
        MemoryCache::new(&MemoryCacheConfig { max_size })
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = cache(10);
        cache.set("get /a", b"hello".to_vec(), 60).await.unwrap();
        assert_eq!(cache.get("get /a").await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(cache.get("get /b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = cache(10);
        cache.set("short", b"1".to_vec(), 1).await.unwrap();
        cache.set("long", b"2".to_vec(), 60).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let cache = cache(10);
        cache.set("forever", b"v".to_vec(), u64::MAX).await.unwrap();
        assert_eq!(cache.get("forever").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = cache(10);
        cache.set("k", b"first".to_vec(), 60).await.unwrap();
        cache.set("k", b"second".to_vec(), 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_size_bound() {
        let cache = cache(2);
        for key in ["a", "b", "c"] {
            cache.set(key, key.as_bytes().to_vec(), 60).await.unwrap();
        }
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.get("c").await.unwrap(), Some(b"c".to_vec()));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = cache(10);
        cache.set("a", b"1".to_vec(), 60).await.unwrap();
        cache.set("b", b"2".to_vec(), 60).await.unwrap();

        cache.remove("a").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);

        cache.clear().await.unwrap();
        assert_eq!(cache.get("b").await.unwrap(), None);
    }
}

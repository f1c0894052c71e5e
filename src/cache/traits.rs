//! AppCache trait definition.

use async_trait::async_trait;

use crate::cache::CacheError;

/// Longest TTL handed to a backend (100 years). Larger TTLs are clamped so
/// every backend can represent the expiry; Redis rejects `EX` values whose
/// deadline overflows.
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Key-value contract every cache backend fulfils.
///
/// Values are opaque bytes; expiry is delegated to the backend.
#[async_trait]
pub trait AppCache: Send + Sync {
    /// Get a value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value that expires after `ttl_seconds`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    /// Short backend name used in logs.
    fn name(&self) -> &'static str;
}

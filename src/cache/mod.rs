//! Cache backends behind one [`AppCache`] contract.
//!
//! - `memory`: in-process, per-entry TTL, bounded size
//! - `redis`: pooled connections, native `SET ... EX` expiry
//! - `noop`: selected when `cache.enabled = false`
//!
//! ```toml
//! [cache]
//! enabled = true
//! adapter = "redis"   # or "memory"
//!
//! [cache.redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 4
//! connection_timeout = 5
//! key_prefix = "staticize"
//! ```

mod error;
mod manager;
mod memory;
mod noop;
mod redis;
mod traits;

pub use self::error::CacheError;
pub use self::manager::CacheManager;
pub use self::memory::MemoryCache;
pub use self::noop::NoOpCache;
pub use self::redis::RedisCache;
pub use self::traits::{AppCache, MAX_TTL_SECONDS};

//! Response caching middleware.
//!
//! [`CacheLayer`] wraps any axum handler or router. For each request it
//! resolves the route's TTL, builds a [`CacheKey`], and either replays a
//! stored [`CacheEntry`] or runs the handler and stores what it returns.

pub mod cors;
pub mod entry;
pub mod freshness;
pub mod key;
mod layer;

pub use self::entry::CacheEntry;
pub use self::key::{CacheKey, KeyExtension};
pub use self::layer::{CacheLayer, CacheService};

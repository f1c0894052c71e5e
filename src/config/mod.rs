//! Configuration management for staticize
//!
//! Settings come either from code (build a [`Settings`] value directly) or
//! from layered TOML files merged with `STATICIZE_*` environment variables.
//!
//! # Configuration Priority (lowest to highest)
//! 1. `default.toml` - Base default configuration
//! 2. `{environment}.toml` - Environment-specific configuration
//! 3. `local.toml` - Local development overrides (not committed to version control)
//! 4. `STATICIZE_*` environment variables

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    CacheAdapter, CacheConfig, CorsSetting, InterceptorConfig, MemoryCacheConfig,
    RedisCacheConfig, RouteOptions, RouteSetting, RoutesConfig, Settings,
};

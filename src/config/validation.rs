//! Configuration validation logic
//!
//! Every section validates itself; [`Settings::validate`] returns the first
//! error encountered. Route validation compiles the full route table so a
//! configuration that validates is one that [`crate::Staticize`] accepts.

use crate::config::error::ConfigError;
use crate::config::settings::{
    CacheAdapter, CacheConfig, FileSettings, InterceptorConfig, LoggerSettings, ServerConfig,
    Settings,
};
use crate::routing::RouteTable;

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// URL schemes accepted by the redis client
const VALID_REDIS_SCHEMES: &[&str] = &["redis://", "rediss://", "redis+unix://", "unix://"];

impl ServerConfig {
    /// Validate server configuration
    ///
    /// # Validation Rules
    /// - Port must be between 1 and 65535
    /// - Request timeout must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    ///
    /// The level is either a bare level name or an `EnvFilter` directive list
    /// such as `info,staticize=debug`; in the latter case every bare level in
    /// the list is checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad_level = self
            .level
            .split(',')
            .map(|directive| directive.rsplit('=').next().unwrap_or_default().trim())
            .find(|level| !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()));

        if let Some(level) = bad_level {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()
    }
}

impl CacheConfig {
    /// Validate cache configuration
    ///
    /// # Validation Rules
    /// - Adapter must be "memory" or "redis"
    /// - Memory cache must hold at least one entry
    /// - Redis URL must use a redis scheme, pool size must be positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.adapter_kind()? {
            CacheAdapter::Memory => {
                if self.memory.max_size == 0 {
                    return Err(ConfigError::validation(
                        "cache.memory.max_size",
                        "Memory cache size must be greater than 0.",
                    ));
                }
            }
            CacheAdapter::Redis => {
                if !VALID_REDIS_SCHEMES
                    .iter()
                    .any(|scheme| self.redis.url.starts_with(scheme))
                {
                    return Err(ConfigError::ValidationError {
                        field: "cache.redis.url".to_string(),
                        message: format!(
                            "Invalid redis URL '{}'. Expected one of: {}",
                            self.redis.url,
                            VALID_REDIS_SCHEMES.join(", ")
                        ),
                    });
                }

                if self.redis.pool_size == 0 {
                    return Err(ConfigError::validation(
                        "cache.redis.pool_size",
                        "Redis pool size must be greater than 0.",
                    ));
                }

                if self.redis.connection_timeout == 0 {
                    return Err(ConfigError::validation(
                        "cache.redis.connection_timeout",
                        "Redis connection timeout must be greater than 0 seconds.",
                    ));
                }
            }
        }

        Ok(())
    }
}

impl InterceptorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.body_limit == 0 {
            return Err(ConfigError::validation(
                "interceptor.body_limit",
                "Body limit must be greater than 0 bytes.",
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Validate all configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logger.validate()?;
        self.cache.validate()?;
        self.interceptor.validate()?;
        RouteTable::from_config(&self.routes)?;
        Ok(())
    }
}

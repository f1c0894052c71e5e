use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::logger::LoggerError;

/// Top-level error returned while building the middleware and by the CLI.
///
/// Per-request failures never surface here: the interceptor logs backend
/// problems and falls back to the downstream handler.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or unreadable configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cache backend could not be created
    #[error("Cache initialization failed")]
    Cache {
        #[source]
        source: CacheError,
    },

    /// Logging could not be set up
    #[error(transparent)]
    Logger(#[from] LoggerError),

    /// Server socket could not be bound or served
    #[error("Server error: {message}")]
    Server {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl From<CacheError> for AppError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Config(config) => AppError::Config(config),
            other => AppError::Cache { source: other },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_error_is_flattened() {
        let err: AppError = CacheError::Config(ConfigError::UnsupportedAdapter("disk".into())).into();
        assert!(matches!(err, AppError::Config(ConfigError::UnsupportedAdapter(_))));
        assert_eq!(err.to_string(), "Unsupported cache adapter: disk");
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let err: AppError = CacheError::Connection("refused".into()).into();
        assert!(matches!(err, AppError::Cache { .. }));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert!(source.is_some_and(|s| s.contains("refused")));
    }
}

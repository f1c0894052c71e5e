//! Cache error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Cache connection failed: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        CacheError::Serialization(error.to_string())
    }
}

//! Error types for the logger

use thiserror::Error;

/// Errors that can occur while setting up log outputs
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

impl LoggerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

//! Error types shared across the harness.

use thiserror::Error;

/// Errors raised while loading or validating harness settings.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<::config::ConfigError> for HarnessError {
    fn from(err: ::config::ConfigError) -> Self {
        HarnessError::Config(err.to_string())
    }
}

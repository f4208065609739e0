//! Core error types

use thiserror::Error;

/// Core error type for NodeInit
#[derive(Debug, Error)]
pub enum Error {
    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML or does not match the schema
    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration parsed but violates a constraint
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

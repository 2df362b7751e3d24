//! Common error types for ipvsmeshd Rust components.

use std::fmt;

/// A specialized Result type for ipvsmeshd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for ipvsmeshd operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("IPVS applier error: {0}")]
    Apply(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new plugin error.
    pub fn plugin(msg: impl fmt::Display) -> Self {
        Error::Plugin(msg.to_string())
    }

    /// Create a new applier error.
    pub fn apply(msg: impl fmt::Display) -> Self {
        Error::Apply(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}

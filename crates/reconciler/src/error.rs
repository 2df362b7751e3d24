//! Reconciler-local error type, composed into `common::Error` at the
//! daemon boundary (§7 Error Handling Design).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("configuration error: {0}")]
    Config(#[from] model::ConfigError),

    #[error("plugin error: {0}")]
    Plugin(#[from] plugin::PluginError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;

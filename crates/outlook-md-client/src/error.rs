//! Client error types.

use outlook_md_core::{TracingError, WindowError};
use outlook_md_providers::ProviderError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid setting (timezone, URL, missing home directory).
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    /// A credential store failed.
    #[error("credential store error: {0}")]
    Credential(String),

    /// Authentication, cache, transport or parse failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid time window: {0}")]
    Window(#[from] WindowError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),
}

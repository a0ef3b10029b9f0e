//! Error types for proxy synchronization.

use phpdock_runtime::RuntimeError;
use thiserror::Error;

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors that can occur regenerating the proxy configuration.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Reading the persisted project set failed.
    #[error("failed to read projects: {0}")]
    Catalog(String),

    /// Writing the configuration into the container failed.
    #[error("failed to write proxy configuration: {0}")]
    WriteFailed(String),

    /// `caddy fmt` rejected the generated configuration.
    #[error("proxy configuration format check failed: {0}")]
    FormatFailed(String),

    /// `caddy reload` failed.
    #[error("proxy reload failed: {0}")]
    ReloadFailed(String),

    /// Runtime gateway error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

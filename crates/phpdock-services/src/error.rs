//! Error types for the service lifecycle manager.

use phpdock_core::StoreError;
use phpdock_runtime::RuntimeError;
use thiserror::Error;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that can occur managing auxiliary services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The id is not in the registry.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The operation requires the service to be installed.
    #[error("service {0} is not installed")]
    NotInstalled(String),

    /// Persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Runtime gateway error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

//! Error types for project orchestration.

use phpdock_core::{PhpVersion, StoreError};
use phpdock_core::project::Framework;
use phpdock_runtime::RuntimeError;
use phpdock_transfer::TransferError;
use thiserror::Error;

/// Result type for project operations.
pub type Result<T> = std::result::Result<T, ProjectError>;

/// Errors that can occur managing projects.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Bad input; surfaced immediately, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// A mutating operation was called before the store was initialized.
    /// This is a programmer error, not a recoverable condition.
    #[error("project store has not been initialized")]
    NotInitialized,

    /// No project with the given id.
    #[error("project not found: {0}")]
    NotFound(String),

    /// The selected runtime version violates a framework constraint.
    #[error("{framework} requires PHP {required} or newer, but {actual} was selected")]
    VersionConstraint {
        /// The framework imposing the bound.
        framework: Framework,
        /// Minimum supported version.
        required: PhpVersion,
        /// Version that was selected.
        actual: PhpVersion,
    },

    /// Devcontainer file generation failed.
    #[error("file generation failed: {0}")]
    Template(String),

    /// Persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Runtime gateway error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Volume transfer error.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProjectError {
    /// Creates a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

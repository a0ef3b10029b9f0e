//! Error types for transfer operations.

use phpdock_core::SyncDirection;
use phpdock_runtime::RuntimeError;
use thiserror::Error;

/// Result type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors that can occur moving files between host and volume.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The helper container exited with a non-zero status.
    #[error("transfer failed: {context}\n{logs}")]
    Failed {
        /// What went wrong.
        context: String,
        /// Tail of the helper's captured output.
        logs: String,
    },

    /// The operation exceeded its deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// Operation description.
        operation: String,
        /// Deadline in seconds.
        seconds: u64,
    },

    /// A sync is already running for this project.
    #[error("a {direction:?} sync is already in progress for this project")]
    AlreadySyncing {
        /// Direction of the active sync.
        direction: SyncDirection,
    },

    /// The operation was cancelled by the user.
    #[error("transfer was cancelled")]
    Cancelled,

    /// Runtime gateway error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl TransferError {
    /// Creates a failed error from a helper exit code and captured logs.
    pub fn helper_failed(code: i64, logs: impl Into<String>) -> Self {
        Self::Failed {
            context: format!("helper container exited with status {code}"),
            logs: logs.into(),
        }
    }
}

//! Errors for the persistence primitives.

use thiserror::Error;

/// Errors raised by [`JsonStore`](crate::store::JsonStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to serialize or deserialize a document.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document on disk carries a schema version this build does not
    /// understand.
    #[error("unsupported schema version {found} (expected {expected})")]
    SchemaVersion {
        /// Version found on disk.
        found: String,
        /// Version this build writes.
        expected: String,
    },
}

//! Error types for the runtime gateway.

use thiserror::Error;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur talking to the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The container engine is not reachable.
    #[error("container runtime is not running: {0}")]
    Unavailable(String),

    /// Container not found.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Volume not found.
    #[error("volume not found: {0}")]
    VolumeNotFound(String),

    /// Failed to pull an image.
    #[error("failed to pull image {image}: {reason}")]
    ImagePullFailed {
        /// The image that failed to pull.
        image: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Exec inside a container failed to run.
    #[error("exec failed in container {container}: {reason}")]
    ExecFailed {
        /// The container name or id.
        container: String,
        /// The reason for the failure.
        reason: String,
    },

    /// No free host port within the scan bound.
    #[error("no free port found starting at {start_port} after {attempts} attempts")]
    PortExhaustion {
        /// First port probed.
        start_port: u16,
        /// How many consecutive ports were probed.
        attempts: u16,
    },

    /// Docker API error.
    #[error("Docker API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Creates a container not found error.
    pub fn container_not_found(name: impl Into<String>) -> Self {
        Self::ContainerNotFound(name.into())
    }

    /// Creates a volume not found error.
    pub fn volume_not_found(name: impl Into<String>) -> Self {
        Self::VolumeNotFound(name.into())
    }

    /// Creates an image pull failed error.
    pub fn image_pull_failed(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImagePullFailed { image: image.into(), reason: reason.into() }
    }

    /// Creates an exec failed error.
    pub fn exec_failed(container: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecFailed { container: container.into(), reason: reason.into() }
    }

    /// Returns true if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound(_) | Self::VolumeNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = RuntimeError::unavailable("connection refused");
        assert_eq!(err.to_string(), "container runtime is not running: connection refused");

        let err = RuntimeError::PortExhaustion { start_port: 8080, attempts: 100 };
        assert_eq!(err.to_string(), "no free port found starting at 8080 after 100 attempts");
    }

    #[test]
    fn not_found_classification() {
        assert!(RuntimeError::container_not_found("x").is_not_found());
        assert!(RuntimeError::volume_not_found("x").is_not_found());
        assert!(!RuntimeError::unavailable("x").is_not_found());
    }
}

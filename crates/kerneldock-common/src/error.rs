//! Unified error types for the kerneldock workspace.
//!
//! Only fatal conditions live here. Best-effort operations such as applying
//! the sticky marker report their outcome as plain values instead.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum KernelDockError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The container runtime binary could not be located.
    #[error("container runtime `{binary}` is not available")]
    RuntimeUnavailable {
        /// Binary name or path that was looked up.
        binary: String,
    },

    /// A container runtime operation failed.
    #[error("runtime {operation} failed for {target}: {message}")]
    Runtime {
        /// Runtime operation (`create`, `inspect`, `kill`, ...).
        operation: &'static str,
        /// Image name or container ID the operation targeted.
        target: String,
        /// Diagnostic output reported by the runtime.
        message: String,
    },

    /// Launching a kernel container failed.
    #[error("failed to launch kernel from image {image}: {source}")]
    LaunchFailed {
        /// Image the launch was attempted with.
        image: String,
        /// Underlying failure.
        source: Box<KernelDockError>,
    },

    /// The container started but never received a bridge network address.
    #[error("no IP address for container {container} (image {image})")]
    NoContainerAddress {
        /// Image the container was started from.
        image: String,
        /// Runtime-assigned container ID.
        container: String,
    },

    /// A lifecycle operation was invoked after teardown.
    #[error("kernel container {container} has already been cleaned up")]
    TornDown {
        /// Runtime-assigned container ID.
        container: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl KernelDockError {
    /// Wraps an error raised while launching `image`.
    #[must_use]
    pub fn launch(image: impl Into<String>, source: Self) -> Self {
        Self::LaunchFailed {
            image: image.into(),
            source: Box::new(source),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KernelDockError>;

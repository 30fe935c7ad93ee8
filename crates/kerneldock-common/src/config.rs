//! Global configuration model for kerneldock.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration for launching kernels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelDockConfig {
    /// Directory under which per-kernel connection directories are created.
    pub kernels_dir: PathBuf,
    /// Explicit container runtime binary; looked up on `PATH` when unset.
    pub runtime_binary: Option<PathBuf>,
    /// Mount point of the connection directory inside the container.
    pub connect_mount: String,
    /// Mount point of the working directory inside the container.
    pub working_mount: String,
    /// Interval between exit checks while waiting on a container.
    pub wait_poll_interval_ms: u64,
}

impl KernelDockConfig {
    /// Returns a copy with a different kernels directory.
    #[must_use]
    pub fn with_kernels_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.kernels_dir = dir.into();
        self
    }

    /// Returns a copy with an explicit runtime binary.
    #[must_use]
    pub fn with_runtime_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.runtime_binary = Some(binary.into());
        self
    }
}

impl Default for KernelDockConfig {
    fn default() -> Self {
        Self {
            kernels_dir: constants::kernels_dir().clone(),
            runtime_binary: None,
            connect_mount: constants::CONNECT_MOUNT.to_string(),
            working_mount: constants::WORKING_MOUNT.to_string(),
            wait_poll_interval_ms: constants::DEFAULT_WAIT_POLL_INTERVAL_MS,
        }
    }
}

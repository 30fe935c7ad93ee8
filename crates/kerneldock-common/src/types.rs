//! Domain primitive types used across the kerneldock workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime-assigned identifier of a kernel container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from the value reported by the runtime.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the abbreviated form shown by `docker ps`.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container status as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Created but never started.
    Created,
    /// Primary process is running.
    Running,
    /// Frozen by the runtime.
    Paused,
    /// Being restarted by a restart policy.
    Restarting,
    /// Removal in progress.
    Removing,
    /// Primary process has exited.
    Exited,
    /// Runtime failed to stop or remove it cleanly.
    Dead,
    /// A status this crate does not recognise, such as podman's `stopped`.
    #[serde(other)]
    Unknown,
}

impl ContainerStatus {
    /// Returns true if the primary process is running.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Removing => write!(f, "removing"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of a bounded wait on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The container exited with the given status code.
    Exited(i64),
    /// The timeout elapsed first.
    TimedOut,
    /// The runtime no longer knows the container.
    Missing,
}

//! Container runtime abstraction.
//!
//! The kernel manager only needs a handful of runtime primitives: create,
//! start, inspect, wait, kill, stop, and remove. [`ContainerRuntime`] captures that
//! set so the Docker CLI backend can be swapped for another engine or for an
//! in-memory fake in tests.

pub mod docker;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kerneldock_common::config::KernelDockConfig;
use kerneldock_common::error::Result;
use kerneldock_common::types::{ContainerId, ContainerStatus, WaitStatus};
use nix::sys::signal::Signal;

/// A host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Absolute host path.
    pub source: PathBuf,
    /// Mount point inside the container.
    pub target: String,
    /// Whether the mount is read-only.
    pub read_only: bool,
}

impl BindMount {
    /// Creates a read-write bind mount.
    #[must_use]
    pub fn read_write(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    /// Returns the `type=bind,...` form accepted by `--mount`.
    #[must_use]
    pub fn mount_arg(&self) -> String {
        let mut arg = format!(
            "type=bind,source={},target={}",
            self.source.display(),
            self.target
        );
        if self.read_only {
            arg.push_str(",readonly");
        }
        arg
    }
}

/// What to run: an image plus its bind mounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    /// Image reference.
    pub image: String,
    /// Bind mounts.
    pub mounts: Vec<BindMount>,
}

/// Runtime facts about a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Runtime-assigned identifier.
    pub id: ContainerId,
    /// Current status.
    pub status: ContainerStatus,
    /// Address on the default bridge network, if assigned.
    pub bridge_ip: Option<IpAddr>,
    /// When the primary process last started.
    pub started_at: Option<DateTime<Utc>>,
}

impl ContainerInfo {
    /// Returns true if the primary process is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.status.is_running()
    }
}

/// Container engine operations used by the kernel manager.
///
/// Implementors must be shareable so several kernels can use one runtime.
pub trait ContainerRuntime: Send + Sync {
    /// Creates a container without starting it and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be created.
    fn create(&self, spec: &RunSpec) -> Result<ContainerId>;

    /// Starts a created container in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started. It is left in
    /// the runtime and must be removed by the caller.
    fn start(&self, id: &ContainerId) -> Result<()>;

    /// Refreshes container facts. `Ok(None)` means the runtime does not
    /// know the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be queried.
    fn inspect(&self, id: &ContainerId) -> Result<Option<ContainerInfo>>;

    /// Blocks until the container exits or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime wait itself fails. A timeout is
    /// reported as [`WaitStatus::TimedOut`], not as an error.
    fn wait(&self, id: &ContainerId, timeout: Duration) -> Result<WaitStatus>;

    /// Delivers `signal` to the container's primary process.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    fn kill(&self, id: &ContainerId, signal: Signal) -> Result<()>;

    /// Stops the container gracefully. Stopping an exited or unknown
    /// container succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped.
    fn stop(&self, id: &ContainerId) -> Result<()>;

    /// Removes a stopped container. Removing an unknown container succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Returns whether the runtime is usable on this host.
    fn is_available(&self) -> bool;
}

/// Creates the default runtime backend for `config`.
///
/// # Errors
///
/// Returns an error if no container runtime binary can be found.
pub fn detect_runtime(config: &KernelDockConfig) -> Result<Arc<dyn ContainerRuntime>> {
    let runtime = docker::DockerCli::from_config(config)?;
    Ok(Arc::new(runtime))
}

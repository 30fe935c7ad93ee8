//! Kernel lifecycle control.
//!
//! [`KernelManager`] is the capability set a kernel-management framework
//! drives: liveness, bounded wait, signals, and teardown. It says nothing
//! about containers, so process- or VM-backed kernels can implement it too.
//! [`DockerKernelManager`] is the container-backed implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kerneldock_common::error::{KernelDockError, Result};
use kerneldock_common::types::{ContainerId, WaitStatus};
pub use nix::sys::signal::Signal;

use crate::runtime::ContainerRuntime;
use crate::storage::ScopedDirectory;

/// Lifecycle operations on one running kernel.
pub trait KernelManager {
    /// Returns whether the kernel is still running.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried. A kernel that no
    /// longer exists is reported as `Ok(false)`.
    fn is_alive(&self) -> Result<bool>;

    /// Blocks until the kernel exits or `timeout` elapses, then reports
    /// whether it is still alive. A timeout is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend wait or liveness check fails.
    fn wait(&self, timeout: Duration) -> Result<bool>;

    /// Delivers `signal` to the kernel process.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    fn signal(&self, signal: Signal) -> Result<()>;

    /// Interrupts the kernel with `SIGINT`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    fn interrupt(&self) -> Result<()> {
        self.signal(Signal::SIGINT)
    }

    /// Kills the kernel with `SIGKILL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    fn kill(&self) -> Result<()> {
        self.signal(Signal::SIGKILL)
    }

    /// Releases every resource held for the kernel. Calling it again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource could not be released and may leak.
    fn cleanup(&mut self) -> Result<()>;
}

/// Resources held while the kernel has not been torn down.
#[derive(Debug)]
struct Live {
    connection_dir: ScopedDirectory,
}

/// Kernel manager backed by a container.
///
/// Owns exactly one container and one connection directory.
pub struct DockerKernelManager {
    runtime: Arc<dyn ContainerRuntime>,
    container: ContainerId,
    live: Option<Live>,
}

impl std::fmt::Debug for DockerKernelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerKernelManager")
            .field("container", &self.container)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

impl DockerKernelManager {
    /// Takes ownership of a started container and its connection directory.
    ///
    /// The directory is persisted: the container keeps it mounted, so it is
    /// only removed by [`cleanup`](KernelManager::cleanup), never on drop.
    #[must_use]
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        container: ContainerId,
        connection_dir: ScopedDirectory,
    ) -> Self {
        Self {
            runtime,
            container,
            live: Some(Live {
                connection_dir: connection_dir.persist(),
            }),
        }
    }

    /// Returns the runtime-assigned container ID.
    #[must_use]
    pub const fn container_id(&self) -> &ContainerId {
        &self.container
    }

    /// Returns the connection directory, or `None` after cleanup.
    #[must_use]
    pub fn connection_dir(&self) -> Option<&Path> {
        self.live.as_ref().map(|live| live.connection_dir.path())
    }

    /// Returns true once [`cleanup`](KernelManager::cleanup) has run.
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.live.is_none()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.live.is_none() {
            return Err(KernelDockError::TornDown {
                container: self.container.to_string(),
            });
        }
        Ok(())
    }
}

impl KernelManager for DockerKernelManager {
    fn is_alive(&self) -> Result<bool> {
        if self.live.is_none() {
            return Ok(false);
        }
        let alive = self
            .runtime
            .inspect(&self.container)?
            .is_some_and(|info| info.is_running());
        Ok(alive)
    }

    fn wait(&self, timeout: Duration) -> Result<bool> {
        if self.live.is_none() {
            return Ok(false);
        }
        match self.runtime.wait(&self.container, timeout)? {
            WaitStatus::Exited(code) => {
                tracing::info!(id = %self.container, code, "kernel container exited");
            }
            WaitStatus::TimedOut => tracing::trace!(id = %self.container, "wait timed out"),
            WaitStatus::Missing => tracing::debug!(id = %self.container, "kernel container gone"),
        }
        self.is_alive()
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        self.ensure_live()?;
        self.runtime.kill(&self.container, signal)
    }

    fn cleanup(&mut self) -> Result<()> {
        let Some(live) = self.live.take() else {
            tracing::debug!(id = %self.container, "cleanup already done");
            return Ok(());
        };
        tracing::info!(id = %self.container, "cleaning up kernel container");

        let stopped = self.runtime.stop(&self.container);
        let removed = stopped.and_then(|()| self.runtime.remove(&self.container));
        let released = live.connection_dir.release();
        removed.and(released)
    }
}

//! Kernel container launch.
//!
//! Launch is all-or-nothing: the caller either receives a connection
//! descriptor bound to the container's address together with its manager, or
//! an error after any partially created container and directory have been
//! cleaned up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kerneldock_common::config::KernelDockConfig;
use kerneldock_common::error::{KernelDockError, Result};
use kerneldock_common::types::ContainerId;

use crate::connection::ConnectionInfo;
use crate::manager::DockerKernelManager;
use crate::runtime::{self, BindMount, ContainerRuntime, RunSpec};
use crate::storage::{self, MarkerFn, ScopedDirectory};

/// Starts kernel containers on a container runtime.
pub struct KernelLauncher {
    runtime: Arc<dyn ContainerRuntime>,
    config: KernelDockConfig,
    marker: MarkerFn,
}

impl KernelLauncher {
    /// Creates a launcher on an explicit runtime.
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: KernelDockConfig) -> Self {
        Self {
            runtime,
            config,
            marker: storage::set_sticky_bit,
        }
    }

    /// Replaces the marker applied to connection directories.
    #[must_use]
    pub fn with_marker(mut self, marker: MarkerFn) -> Self {
        self.marker = marker;
        self
    }

    /// Creates a launcher on the runtime detected from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if no container runtime is available.
    pub fn from_config(config: KernelDockConfig) -> Result<Self> {
        let runtime = runtime::detect_runtime(&config)?;
        Ok(Self::new(runtime, config))
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &KernelDockConfig {
        &self.config
    }

    /// Launches `image` with `working_dir` mounted as the kernel's working
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection file cannot be written, the
    /// container cannot be started, or it never receives a bridge address.
    /// Nothing is left running or on disk in that case.
    pub fn launch(
        &self,
        image: &str,
        working_dir: &Path,
    ) -> Result<(ConnectionInfo, DockerKernelManager)> {
        let working_dir = absolute_dir(working_dir)?;
        let connection_dir = ScopedDirectory::acquire_with(&self.config.kernels_dir, self.marker)?;
        let info = ConnectionInfo::generate();
        let _ = info.write_to_dir(connection_dir.path())?;

        let spec = RunSpec {
            image: image.to_string(),
            mounts: vec![
                BindMount::read_write(connection_dir.path(), self.config.connect_mount.as_str()),
                BindMount::read_write(working_dir, self.config.working_mount.as_str()),
            ],
        };
        let container = self
            .runtime
            .create(&spec)
            .map_err(|e| KernelDockError::launch(image, e))?;
        if let Err(e) = self.runtime.start(&container) {
            self.discard(&container);
            return Err(KernelDockError::launch(image, e));
        }

        let state = match self.runtime.inspect(&container) {
            Ok(state) => state,
            Err(e) => {
                self.discard(&container);
                return Err(KernelDockError::launch(image, e));
            }
        };
        let started_at = state.as_ref().and_then(|s| s.started_at);
        let Some(ip) = state.and_then(|s| s.bridge_ip) else {
            self.discard(&container);
            return Err(KernelDockError::NoContainerAddress {
                image: image.to_string(),
                container: container.to_string(),
            });
        };

        tracing::info!(
            id = %container.short(),
            image,
            %ip,
            started_at = ?started_at,
            "kernel container started"
        );
        let manager = DockerKernelManager::new(Arc::clone(&self.runtime), container, connection_dir);
        Ok((info.with_ip(ip), manager))
    }

    /// Stops and removes a container that failed to launch.
    fn discard(&self, container: &ContainerId) {
        let result = self
            .runtime
            .stop(container)
            .and_then(|()| self.runtime.remove(container));
        if let Err(e) = result {
            tracing::warn!(id = %container, error = %e, "failed to discard kernel container");
        }
    }
}

/// Resolves `dir` to an absolute path, as bind mounts require.
fn absolute_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(dir).map_err(|e| KernelDockError::Io {
        path: dir.to_path_buf(),
        source: e,
    })
}

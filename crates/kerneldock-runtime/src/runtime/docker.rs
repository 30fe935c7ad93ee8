//! Docker backend driven through the `docker` command-line client.

use std::collections::HashMap;
use std::io::Read;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use kerneldock_common::config::KernelDockConfig;
use kerneldock_common::constants;
use kerneldock_common::error::{KernelDockError, Result};
use kerneldock_common::types::{ContainerId, ContainerStatus, WaitStatus};
use nix::sys::signal::Signal;
use serde::Deserialize;

use super::{ContainerInfo, ContainerRuntime, RunSpec};

/// Runtime backend that shells out to the Docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    poll_interval: Duration,
}

impl DockerCli {
    /// Creates a backend using an explicit client binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            binary: binary.into(),
            poll_interval,
        }
    }

    /// Creates a backend from configuration, locating `docker` on `PATH`
    /// when no binary is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if no binary is configured and `docker` is not on
    /// `PATH`.
    pub fn from_config(config: &KernelDockConfig) -> Result<Self> {
        let binary = match &config.runtime_binary {
            Some(binary) => binary.clone(),
            None => which::which(constants::DEFAULT_RUNTIME_BINARY).map_err(|_| {
                KernelDockError::RuntimeUnavailable {
                    binary: constants::DEFAULT_RUNTIME_BINARY.to_string(),
                }
            })?,
        };
        Ok(Self::new(
            binary,
            Duration::from_millis(config.wait_poll_interval_ms),
        ))
    }

    /// Returns the client binary path.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn invoke(&self, operation: &'static str, target: &str, args: &[String]) -> Result<Output> {
        tracing::debug!(binary = %self.binary.display(), ?args, "invoking docker");
        self.command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| KernelDockError::Runtime {
                operation,
                target: target.to_string(),
                message: format!("failed to execute {}: {e}", self.binary.display()),
            })
    }

    /// Runs a command that must succeed.
    fn invoke_checked(
        &self,
        operation: &'static str,
        target: &str,
        args: &[String],
    ) -> Result<Output> {
        self.invoke_tolerant(operation, target, args)?
            .ok_or_else(|| KernelDockError::Runtime {
                operation,
                target: target.to_string(),
                message: format!("No such container: {target}"),
            })
    }

    /// Runs a command whose only acceptable failure is the container being
    /// unknown, reported as `Ok(None)`.
    fn invoke_tolerant(
        &self,
        operation: &'static str,
        target: &str,
        args: &[String],
    ) -> Result<Option<Output>> {
        let output = self.invoke(operation, target, args)?;
        if output.status.success() {
            return Ok(Some(output));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(&stderr) {
            return Ok(None);
        }
        Err(KernelDockError::Runtime {
            operation,
            target: target.to_string(),
            message: stderr.trim().to_string(),
        })
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

impl ContainerRuntime for DockerCli {
    fn create(&self, spec: &RunSpec) -> Result<ContainerId> {
        tracing::info!(image = %spec.image, "creating container");
        let output = self.invoke_checked("create", &spec.image, &create_args(spec))?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(KernelDockError::Runtime {
                operation: "create",
                target: spec.image.clone(),
                message: "runtime did not report a container ID".into(),
            });
        }
        Ok(ContainerId::new(id))
    }

    fn start(&self, id: &ContainerId) -> Result<()> {
        let args = vec!["start".to_string(), id.to_string()];
        let _ = self.invoke_checked("start", id.as_str(), &args)?;
        Ok(())
    }

    fn inspect(&self, id: &ContainerId) -> Result<Option<ContainerInfo>> {
        let args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
            id.to_string(),
        ];
        match self.invoke_tolerant("inspect", id.as_str(), &args)? {
            Some(output) => parse_inspect(&String::from_utf8_lossy(&output.stdout)),
            None => Ok(None),
        }
    }

    fn wait(&self, id: &ContainerId, timeout: Duration) -> Result<WaitStatus> {
        let runtime_err = |message: String| KernelDockError::Runtime {
            operation: "wait",
            target: id.to_string(),
            message,
        };
        let mut child = self
            .command()
            .args(["wait", id.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| runtime_err(format!("failed to execute {}: {e}", self.binary.display())))?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(|e| runtime_err(e.to_string()))? {
                let mut stdout = String::new();
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stdout.take() {
                    let _ = pipe.read_to_string(&mut stdout);
                }
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                if status.success() {
                    let code: i64 = stdout.trim().parse().unwrap_or(-1);
                    tracing::debug!(id = %id, code, "container exited");
                    return Ok(WaitStatus::Exited(code));
                }
                if is_not_found(&stderr) {
                    return Ok(WaitStatus::Missing);
                }
                return Err(runtime_err(stderr.trim().to_string()));
            }

            let now = Instant::now();
            if now >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!(id = %id, ?timeout, "wait timed out");
                return Ok(WaitStatus::TimedOut);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn kill(&self, id: &ContainerId, signal: Signal) -> Result<()> {
        tracing::info!(id = %id, signal = signal.as_str(), "signalling container");
        let args = vec![
            "kill".to_string(),
            "--signal".to_string(),
            signal.as_str().to_string(),
            id.to_string(),
        ];
        let _ = self.invoke_checked("kill", id.as_str(), &args)?;
        Ok(())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        let args = vec!["stop".to_string(), id.to_string()];
        if self.invoke_tolerant("stop", id.as_str(), &args)?.is_none() {
            tracing::debug!(id = %id, "container already gone before stop");
        }
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let args = vec!["rm".to_string(), id.to_string()];
        if self.invoke_tolerant("rm", id.as_str(), &args)?.is_none() {
            tracing::debug!(id = %id, "container already gone before remove");
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.command()
            .args(["version", "--format", "{{.Server.Version}}"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}

/// Builds the `docker create` argument list for `spec`.
#[must_use]
pub fn create_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec!["create".to_string()];
    for mount in &spec.mounts {
        args.push("--mount".to_string());
        args.push(mount.mount_arg());
    }
    args.push(spec.image.clone());
    args
}

/// Returns true if the runtime's error output says the container is unknown.
#[must_use]
pub fn is_not_found(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    id: String,
    state: InspectState,
    #[serde(default)]
    network_settings: NetworkSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: ContainerStatus,
    #[serde(default)]
    started_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    networks: HashMap<String, EndpointSettings>,
}

#[derive(Debug, Deserialize)]
struct EndpointSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Parses `docker inspect` output into container facts.
///
/// # Errors
///
/// Returns an error if the output is not valid inspect JSON.
pub fn parse_inspect(json: &str) -> Result<Option<ContainerInfo>> {
    let records: Vec<InspectRecord> = serde_json::from_str(json)?;
    let Some(record) = records.into_iter().next() else {
        return Ok(None);
    };

    let bridge_ip = record
        .network_settings
        .networks
        .get(constants::BRIDGE_NETWORK)
        .map(|endpoint| endpoint.ip_address.trim())
        .filter(|ip| !ip.is_empty())
        .and_then(|ip| match ip.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(e) => {
                tracing::warn!(id = %record.id, ip, error = %e, "unparseable bridge address");
                None
            }
        });
    let started_at = record
        .state
        .started_at
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Ok(Some(ContainerInfo {
        id: ContainerId::new(record.id),
        status: record.state.status,
        bridge_ip,
        started_at,
    }))
}

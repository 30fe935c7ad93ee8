//! Connection file generation.
//!
//! A connection file tells both the in-container kernel and the remote client
//! which ports, transport, and signing key to use. It is written before the
//! container starts (the kernel reads it from the `/connect` mount) and its
//! address is filled in once the container has a bridge IP.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use kerneldock_common::constants;
use kerneldock_common::error::{KernelDockError, Result};
use serde::{Deserialize, Serialize};

/// Ports of the five kernel channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPorts {
    /// Request/reply channel for code execution.
    pub shell_port: u16,
    /// Broadcast channel for outputs and status.
    pub iopub_port: u16,
    /// Channel for input requests sent to the client.
    pub stdin_port: u16,
    /// Out-of-band control channel.
    pub control_port: u16,
    /// Heartbeat echo channel.
    pub hb_port: u16,
}

impl ChannelPorts {
    /// Returns the fixed port assignment.
    #[must_use]
    pub fn fixed() -> Self {
        let port = |name| constants::channel_port(name).unwrap_or_default();
        Self {
            shell_port: port("shell_port"),
            iopub_port: port("iopub_port"),
            stdin_port: port("stdin_port"),
            control_port: port("control_port"),
            hb_port: port("hb_port"),
        }
    }
}

/// Rendezvous information for one kernel.
///
/// Fields are read-only to callers. The address is the only value that
/// changes after generation, and only the launcher may change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    transport: String,
    ip: IpAddr,
    key: String,
    signature_scheme: String,
    #[serde(flatten)]
    ports: ChannelPorts,
}

impl ConnectionInfo {
    /// Generates a descriptor with a fresh random key and the fixed ports.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            transport: constants::TRANSPORT.to_string(),
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            key: uuid::Uuid::new_v4().to_string(),
            signature_scheme: constants::SIGNATURE_SCHEME.to_string(),
            ports: ChannelPorts::fixed(),
        }
    }

    /// Writes the descriptor to `dir/kernel.json` and returns the file path.
    ///
    /// The sticky marker is applied to the file afterwards; failing to do so
    /// is logged, never returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(constants::CONNECTION_FILE_NAME);
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, body).map_err(|e| KernelDockError::Io {
            path: path.clone(),
            source: e,
        })?;
        let _ = crate::storage::mark_and_log(&path, crate::storage::set_sticky_bit);
        tracing::debug!(path = %path.display(), "connection file written");
        Ok(path)
    }

    /// Reads a descriptor back from a connection file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path).map_err(|e| KernelDockError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Returns a copy bound to the container's resolved address.
    #[must_use]
    pub(crate) fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = ip;
        self
    }

    /// Transport name, always `tcp`.
    #[must_use]
    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// Address the kernel listens on.
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Message signing key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Message signing scheme, always `hmac-sha256`.
    #[must_use]
    pub fn signature_scheme(&self) -> &str {
        &self.signature_scheme
    }

    /// Channel ports.
    #[must_use]
    pub const fn ports(&self) -> ChannelPorts {
        self.ports
    }
}

/// Generates a descriptor and writes it into `dir`.
///
/// # Errors
///
/// Returns an error if the connection file cannot be written.
pub fn make_connection_file(dir: &Path) -> Result<ConnectionInfo> {
    let info = ConnectionInfo::generate();
    let _ = info.write_to_dir(dir)?;
    Ok(info)
}

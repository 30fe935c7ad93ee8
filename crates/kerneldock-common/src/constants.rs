//! Protocol constants and default paths.
//!
//! The channel ports, mount points, and file name below form a compatibility
//! contract with the kernel process baked into the container image. They must
//! not change between releases.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Transport written into every connection file.
pub const TRANSPORT: &str = "tcp";

/// Message signing scheme written into every connection file.
pub const SIGNATURE_SCHEME: &str = "hmac-sha256";

/// Name of the connection file inside the connection directory.
pub const CONNECTION_FILE_NAME: &str = "kernel.json";

/// Mount point of the connection directory inside the container.
pub const CONNECT_MOUNT: &str = "/connect";

/// Mount point of the working directory inside the container.
pub const WORKING_MOUNT: &str = "/working";

/// Name of the docker network the kernel address is read from.
pub const BRIDGE_NETWORK: &str = "bridge";

/// Subdirectory of the Jupyter runtime directory holding connection dirs.
pub const KERNELS_SUBDIR: &str = "docker_kernels";

/// Prefix of each per-kernel connection directory.
pub const CONNECTION_DIR_PREFIX: &str = "tmp";

/// Default container runtime binary.
pub const DEFAULT_RUNTIME_BINARY: &str = "docker";

/// Default interval between exit checks while waiting on a container.
pub const DEFAULT_WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Fixed channel port assignment, in connection-file order.
pub static CHANNEL_PORTS: [(&str, u16); 5] = [
    ("shell_port", 9001),
    ("iopub_port", 9002),
    ("stdin_port", 9003),
    ("control_port", 9004),
    ("hb_port", 9005),
];

/// Looks up a channel port by its connection-file key.
#[must_use]
pub fn channel_port(name: &str) -> Option<u16> {
    CHANNEL_PORTS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, port)| *port)
}

/// Resolves the Jupyter runtime directory.
///
/// Honours `$JUPYTER_RUNTIME_DIR`, then `$XDG_RUNTIME_DIR/jupyter`, then
/// falls back to `$HOME/.local/share/jupyter/runtime`.
fn resolve_jupyter_runtime_dir() -> PathBuf {
    if let Some(dir) = non_empty_env("JUPYTER_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(dir) = non_empty_env("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir).join("jupyter");
    }
    let home = non_empty_env("HOME")
        .or_else(|| non_empty_env("USERPROFILE"))
        .unwrap_or_else(|| std::env::temp_dir().to_string_lossy().into_owned());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("jupyter")
        .join("runtime")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

static KERNELS_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory that holds per-kernel connection directories.
pub fn kernels_dir() -> &'static PathBuf {
    KERNELS_DIR.get_or_init(|| resolve_jupyter_runtime_dir().join(KERNELS_SUBDIR))
}

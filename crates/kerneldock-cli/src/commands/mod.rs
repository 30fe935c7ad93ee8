//! CLI command definitions and dispatch.

pub mod connection;
pub mod launch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kerneldock_common::config::KernelDockConfig;

/// kerneldock: run kernels in containers.
#[derive(Parser, Debug)]
#[command(name = "kerneldock", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Directory under which connection directories are created.
    #[arg(long, global = true, env = "KERNELDOCK_KERNELS_DIR")]
    pub kernels_dir: Option<PathBuf>,

    /// Container runtime client binary (defaults to `docker` on PATH).
    #[arg(long, global = true, env = "KERNELDOCK_RUNTIME")]
    pub runtime: Option<PathBuf>,
}

impl Cli {
    /// Builds the runtime configuration from defaults and global flags.
    fn config(&self) -> KernelDockConfig {
        let mut config = KernelDockConfig::default();
        if let Some(dir) = &self.kernels_dir {
            config = config.with_kernels_dir(dir);
        }
        if let Some(binary) = &self.runtime {
            config = config.with_runtime_binary(binary);
        }
        config
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a kernel container and supervise it until Ctrl+C.
    Launch(launch::LaunchArgs),
    /// Write a fresh connection file into a directory.
    Connection(connection::ConnectionArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config();
    match cli.command {
        Command::Launch(args) => launch::execute(args, config),
        Command::Connection(args) => connection::execute(&args),
    }
}

//! # kerneldock
//!
//! Launches a kernel inside a container and prints the connection file a
//! remote client needs to reach it.

mod commands;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}

//! `kerneldock connection`: write a fresh connection file.

use std::path::PathBuf;

use clap::Args;

/// Arguments for the `connection` command.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Directory to write `kernel.json` into.
    pub dir: PathBuf,
}

/// Executes the `connection` command.
///
/// # Errors
///
/// Returns an error if the directory does not exist or is not writable.
#[allow(clippy::print_stdout)]
pub fn execute(args: &ConnectionArgs) -> anyhow::Result<()> {
    let info = kerneldock_runtime::connection::make_connection_file(&args.dir)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    tracing::info!(dir = %args.dir.display(), "connection file written");
    Ok(())
}

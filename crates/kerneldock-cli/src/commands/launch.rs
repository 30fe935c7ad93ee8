//! `kerneldock launch`: start a kernel container and supervise it.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use kerneldock_common::config::KernelDockConfig;
use kerneldock_runtime::launcher::KernelLauncher;
use kerneldock_runtime::manager::KernelManager;

/// Arguments for the `launch` command.
#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Image whose entrypoint starts the kernel.
    pub image: String,

    /// Host directory mounted at `/working` inside the container.
    #[arg(short, long, default_value = ".")]
    pub workdir: PathBuf,

    /// Print the connection info and leave the container running.
    #[arg(short, long)]
    pub detach: bool,
}

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

const POLL: Duration = Duration::from_millis(250);

/// Executes the `launch` command.
///
/// # Errors
///
/// Returns an error if the launch or the final cleanup fails.
#[allow(clippy::print_stdout)]
pub fn execute(args: LaunchArgs, config: KernelDockConfig) -> anyhow::Result<()> {
    let launcher = KernelLauncher::from_config(config)?;
    let (info, mut manager) = launcher.launch(&args.image, &args.workdir)?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    eprintln!();
    eprintln!(
        "  {GREEN}{BOLD}Kernel started{RESET} {DIM}[{}]{RESET}",
        manager.container_id().short()
    );

    if args.detach {
        eprintln!(
            "  Running detached. Remove it with {BOLD}docker rm -f {}{RESET}",
            manager.container_id()
        );
        if let Some(dir) = manager.connection_dir() {
            eprintln!("  Connection files stay in {DIM}{}{RESET}", dir.display());
        }
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    let handler = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"));

    supervise(&mut manager, &running, handler)?;
    eprintln!("  {GREEN}Kernel removed.{RESET}");
    Ok(())
}

/// Waits until `running` is cleared or the kernel exits, then tears the
/// kernel down.
///
/// Cleanup runs on every path. The first error wins: a failed handler
/// installation or wait is reported ahead of a cleanup failure.
fn supervise(
    manager: &mut dyn KernelManager,
    running: &AtomicBool,
    handler: anyhow::Result<()>,
) -> anyhow::Result<()> {
    let watched = handler.and_then(|()| {
        eprintln!("  Press {BOLD}Ctrl+C{RESET} to shut the kernel down...");
        while running.load(Ordering::SeqCst) {
            if !manager.wait(POLL)? {
                eprintln!("  Kernel exited.");
                break;
            }
        }
        Ok(())
    });
    if let Err(e) = &watched {
        tracing::warn!(error = %e, "kernel supervision failed");
    }

    eprintln!("  Cleaning up...");
    let cleaned = manager.cleanup().map_err(anyhow::Error::from);
    watched.and(cleaned)
}

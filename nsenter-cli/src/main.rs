//! nsenter: run a program with namespaces of other processes

use clap::Parser;
use nix::sys::signal::{SigHandler, kill, signal};
use nix::unistd::getpid;
use nsenter_core::constants::{APP_NAME, LOG_ENV};
use nsenter_namespace::ChildExit;
use std::process;
use tracing::{Level, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod run;

use cli::Cli;

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // NSENTER_LOG wins over --verbose
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let log_level = if cli.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        };
        EnvFilter::default().add_directive(log_level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run::execute(&cli) {
        Ok(exit) => mirror_exit(exit),
        Err(e) => {
            eprintln!("{APP_NAME}: {e:#}");
            process::exit(1);
        }
    }
}

/// Terminate the way the relayed child did
fn mirror_exit(exit: ChildExit) -> ! {
    match exit {
        ChildExit::Exited(code) => process::exit(code),
        ChildExit::Signaled(sig) => {
            // SAFETY: restoring the default disposition is always sound.
            if let Err(e) = unsafe { signal(sig, SigHandler::SigDfl) } {
                warn!(signal = ?sig, error = %e, "Cannot reset signal disposition");
            }
            let _ = kill(getpid(), sig);
            process::exit(1)
        }
    }
}

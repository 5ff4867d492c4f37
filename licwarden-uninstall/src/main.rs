//! licwarden uninstaller
//!
//! Usage:
//!   licwarden-uninstall [--root <dir>] [--verbose]
//!
//! Exits non-zero if any path could not be removed for a reason other than
//! already being absent.

use anyhow::{Result, bail};
use clap::Parser;
use licwarden_uninstall::{declare_maintenance, uninstall};
use std::path::PathBuf;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "licwarden-uninstall")]
#[command(about = "Remove a licwarden installation")]
struct Args {
    /// Root directory the installation lives under
    #[arg(long, default_value = "/")]
    root: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    if declare_maintenance() {
        debug!("Declared maintenance to the preloaded guard");
    }

    let report = uninstall(&args.root);
    for (path, e) in &report.failed {
        eprintln!("remove({}): {}", path.display(), e);
    }
    info!(
        "Removed {} path(s), {} already absent",
        report.removed.len(),
        report.absent.len()
    );

    if !report.is_success() {
        bail!("{} path(s) could not be removed", report.failed.len());
    }
    Ok(())
}

//! cosync — mirror a revision's file changes into an object-storage bucket.
//!
//! # Usage
//!
//! ```text
//! cosync sync --bucket <bucket> --region <region> --sub-path <prefix> [--dry-run] [--json]
//!             [--strict]
//! cosync sync --changes changes.json --dry-run
//! cosync check-ignore <path>...
//! ```
//!
//! Every `sync` option also reads the matching GitHub Actions input variable
//! (`INPUT_BUCKET`, `INPUT_SUBPATH`, ...), so the binary runs unchanged as an
//! action step.

mod changes;
mod commands;
mod github;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check_ignore::CheckIgnoreArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cosync",
    version,
    about = "Mirror a commit's file changes into an S3-compatible bucket",
    long_about = None,
)]
struct Cli {
    /// Log planned actions and storage calls (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload, delete and move objects to match the latest commit's changes.
    Sync(SyncArgs),

    /// Show whether paths are excluded by the ignore file.
    CheckIgnore(CheckIgnoreArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::CheckIgnore(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "info,cosync=debug,cosync_sync=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

//! Snap CLI - snap command

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod util;

/// Snap - content-addressed snapshots of a working directory
#[derive(Parser)]
#[command(name = "snap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a snap store in a directory (default: current directory)
    Init {
        path: Option<PathBuf>,
    },
    /// Record the working tree as a new snapshot
    Snapshot,
    /// Show files a snapshot would record as new or modified
    Status {
        /// Compare against this snapshot instead of the latest
        #[arg(long)]
        against: Option<String>,
    },
    /// List snapshots, newest first
    Log {
        /// Number of snapshots to show (default: all)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the files recorded in a snapshot
    Show {
        /// Snapshot ID or unique prefix
        snapshot: String,
        /// Print as an indented tree
        #[arg(long)]
        tree: bool,
    },
    /// Materialize a snapshot
    Checkout {
        /// Snapshot ID or unique prefix
        snapshot: String,
        /// Destination directory (default: the working root)
        #[arg(long)]
        dest: Option<PathBuf>,
        /// How files are materialized (default: from config)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Never remove working files; fail if a destination exists
        #[arg(long)]
        keep_existing: bool,
    },
    /// Remove a snapshot (blobs are reclaimed by gc)
    Rm {
        snapshot: String,
    },
    /// Delete blobs no snapshot references
    Gc,
    /// Remove every snapshot older than the given one
    Wipe {
        #[arg(long)]
        before: String,
    },
    /// Keep only the newest snapshots, then collect garbage
    Prune {
        /// Snapshots to keep (default: retention.keep_last from config)
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Check stored blobs against their names and snapshot references
    Verify,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Copy,
    Hardlink,
    Symlink,
}

impl From<ModeArg> for snap_core::MaterializeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Copy => Self::Copy,
            ModeArg::Hardlink => Self::Hardlink,
            ModeArg::Symlink => Self::Symlink,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path } => cmd::init::run(path),
        Commands::Snapshot => cmd::snapshot::run(),
        Commands::Status { against } => cmd::status::run(against.as_deref()),
        Commands::Log { limit } => cmd::log::run(limit),
        Commands::Show { snapshot, tree } => cmd::show::run(&snapshot, tree),
        Commands::Checkout { snapshot, dest, mode, keep_existing } => {
            cmd::checkout::run(&snapshot, dest, mode.map(Into::into), keep_existing)
        }
        Commands::Rm { snapshot } => cmd::rm::run(&snapshot),
        Commands::Gc => cmd::gc::run(),
        Commands::Wipe { before } => cmd::wipe::run(&before),
        Commands::Prune { keep } => cmd::prune::run(keep),
        Commands::Verify => cmd::verify::run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_checkout() {
        let cli = Cli::parse_from(["snap", "-v", "checkout", "abcd", "--mode", "hardlink", "--dest", "out"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Checkout { snapshot, dest, mode, keep_existing } => {
                assert_eq!(snapshot, "abcd");
                assert_eq!(dest, Some(PathBuf::from("out")));
                assert!(matches!(mode, Some(ModeArg::Hardlink)));
                assert!(!keep_existing);
            }
            _ => panic!("expected checkout"),
        }
    }
}

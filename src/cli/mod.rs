//! CLI argument parsing for cadlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Cadlock: advisory leases on shared CAD documents.
///
/// Every workstation runs an agent that notices which documents are open in
/// the CAD application and records a lease file for each in a shared lock
/// directory, so that colleagues opening the same document are warned.
#[derive(Parser, Debug)]
#[command(name = "cadlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to $CADLOCK_CONFIG, then ./cadlock.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for cadlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take a manual lease on a document.
    ///
    /// Fails with exit code 4 if another user holds the document.
    /// Manual leases survive the CAD application closing.
    Acquire(PathArgs),

    /// Release your lease on a document.
    ///
    /// Does nothing if you hold no lease on it.
    Release(PathArgs),

    /// Show who holds a document, or list every lease.
    Status(StatusArgs),

    /// Remove leases of any user that have not been renewed recently.
    ///
    /// Also removes unreadable lease files older than the same age.
    Cleanup(CleanupArgs),

    /// Release every automatic lease you hold.
    ReleaseAll,

    /// Lease a document and open it in the configured editor.
    ///
    /// Opens read-only if someone else holds the document.
    Open(PathArgs),

    /// Run the reconciliation loop in the foreground.
    ///
    /// Acquires, renews and releases leases as documents are opened and
    /// closed. Type `q` or close stdin to stop.
    Monitor(MonitorArgs),

    /// Ask your running monitor to stop.
    Stop,
}

/// Arguments for commands taking a single document path.
#[derive(Parser, Debug)]
pub struct PathArgs {
    /// Path to the document.
    pub path: String,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Document to inspect (lists every lease if omitted).
    pub path: Option<String>,
}

/// Arguments for the `cleanup` command.
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Age past which a lease is removed (defaults to stale_minutes).
    #[arg(long, value_name = "MINUTES")]
    pub max_age_minutes: Option<u32>,
}

/// Arguments for the `monitor` command.
#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Stop after this many cycles.
    #[arg(long, conflicts_with = "once")]
    pub cycles: Option<u64>,

    /// Run a single cycle and stop.
    #[arg(long)]
    pub once: bool,

    /// Do not print lease and collision notifications.
    #[arg(short, long)]
    pub quiet: bool,
}

impl MonitorArgs {
    /// Cycle limit implied by the flags.
    pub fn max_cycles(&self) -> Option<u64> {
        if self.once { Some(1) } else { self.cycles }
    }
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

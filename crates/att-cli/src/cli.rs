//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Biometric attendance reconciliation.
///
/// Pulls punches from fingerprint terminals, stages them once each and turns
/// them into check-in/check-out sessions using the employees' work calendars.
#[derive(Debug, Parser)]
#[command(name = "att", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pull, stage and reconcile punches from the configured terminals.
    Sync {
        /// Only sync this terminal.
        #[arg(long)]
        device: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Stage punches from an attendance log dump without pulling a terminal.
    Stage {
        /// Path to the `attlog` file.
        file: PathBuf,

        /// Name of the terminal the dump came from.
        #[arg(long)]
        device: String,
    },

    /// Reconcile pending punches from all terminals into attendance sessions.
    Reconcile {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show terminal pulls and the reconciliation backlog.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List attendance sessions.
    Sessions {
        /// Only sessions still waiting for a check-out.
        #[arg(long)]
        open: bool,

        /// Only sessions of this employee number.
        #[arg(long)]
        employee: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List staged punches.
    Punches {
        /// Only punches awaiting reconciliation.
        #[arg(long, conflicts_with = "unlinked")]
        pending: bool,

        /// Only punches from device users unknown to the directory.
        #[arg(long)]
        unlinked: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage the employee directory and work calendars.
    #[command(subcommand)]
    Directory(DirectoryAction),

    /// Terminal maintenance.
    #[command(subcommand)]
    Device(DeviceAction),

    /// Show how a punch would be interpreted.
    Explain {
        /// Employee number (device user id).
        #[arg(long)]
        employee: String,

        /// Local punch time, e.g. "2025-03-03 21:00".
        #[arg(long)]
        at: String,
    },
}

/// Directory subcommands.
#[derive(Debug, Subcommand)]
pub enum DirectoryAction {
    /// Load calendars and employees from a JSON file.
    Load {
        /// Path to the directory file.
        file: PathBuf,
    },
}

/// Terminal subcommands.
#[derive(Debug, Subcommand)]
pub enum DeviceAction {
    /// Check that a configured terminal is reachable.
    Test {
        /// Terminal name from the configuration.
        name: String,
    },
}

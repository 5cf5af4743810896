//! Attendance reconciliation CLI library.
//!
//! This crate provides the CLI interface for pulling terminals and
//! reconciling their punches.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, DeviceAction, DirectoryAction};
pub use config::Config;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use att_db::{Database, PunchFilter};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use att_cli::commands::{
    device, directory, explain, punches, reconcile, sessions, stage, status, sync,
};
use att_cli::{Cli, Commands, Config, DeviceAction, DirectoryAction};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = load_config(config_path)?;
    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so JSON output on stdout stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut out = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Sync { device, json }) => {
            let config = load_config(cli.config.as_deref())?;
            sync::run(&mut out, &config, device.as_deref(), *json)?;
        }
        Some(Commands::Stage { file, device }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            stage::run(&mut out, &mut db, &config, file, device)?;
        }
        Some(Commands::Reconcile { json }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            reconcile::run(&mut out, &mut db, &config, *json)?;
        }
        Some(Commands::Status { json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, &config, *json)?;
        }
        Some(Commands::Sessions {
            open,
            employee,
            json,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            sessions::run(&mut out, &db, &config, *open, employee.as_deref(), *json)?;
        }
        Some(Commands::Punches {
            pending,
            unlinked,
            json,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let filter = if *pending {
                PunchFilter::Pending
            } else if *unlinked {
                PunchFilter::Unlinked
            } else {
                PunchFilter::All
            };
            punches::run(&mut out, &db, &config, filter, *json)?;
        }
        Some(Commands::Directory(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                DirectoryAction::Load { file } => {
                    directory::load(&mut out, &mut db, file)?;
                }
            }
        }
        Some(Commands::Device(action)) => {
            let config = load_config(cli.config.as_deref())?;
            match action {
                DeviceAction::Test { name } => device::test(&mut out, &config, name)?,
            }
        }
        Some(Commands::Explain { employee, at }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            explain::run(&mut out, &db, &config, employee, at)?;
        }
        None => {
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    Ok(())
}

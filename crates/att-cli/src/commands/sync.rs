//! Sync command: pull every terminal, stage its punches and reconcile them.
//!
//! Terminals are pulled in parallel, one worker and one database connection
//! each. A pass over a terminal holds an exclusive lock file in the state
//! directory so overlapping runs (a cron job and a manual sync, say) never
//! drive the same terminal at once. Reconciliation runs once, after every
//! terminal has been staged, so punches are applied in global time order.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use att_core::{DevicePunch, ReconcileReport, TerminalName};
use att_db::{Database, StageReport};
use chrono::{Duration, NaiveDate, Utc};
use fs2::FileExt;
use rayon::prelude::*;
use serde::Serialize;

use crate::Config;
use crate::commands::reconcile::write_summary;
use crate::config::DeviceConfig;

/// Outcome of pulling and staging one terminal.
#[derive(Debug, Serialize)]
pub struct DeviceSync {
    pub device: String,
    pub fetched: usize,
    /// Punches older than the configured lookback.
    pub skipped_old: usize,
    pub staged: StageReport,
}

#[derive(Debug, Serialize)]
pub struct DeviceFailure {
    pub device: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub synced: Vec<DeviceSync>,
    pub failed: Vec<DeviceFailure>,
    pub reconciled: ReconcileReport,
}

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    device: Option<&str>,
    json: bool,
) -> Result<SyncReport> {
    let devices: Vec<&DeviceConfig> = match device {
        Some(name) => vec![config.device(name)?],
        None => config.devices.iter().collect(),
    };
    if devices.is_empty() {
        bail!("no devices configured");
    }
    fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("failed to create {}", config.state_dir.display()))?;

    let mut report = stage_devices(config, &devices);

    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    report.reconciled = db.reconcile(&config.reconcile_config())?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_report(writer, &report)?;
    }

    if !report.failed.is_empty() {
        bail!(
            "{} of {} devices failed to sync",
            report.failed.len(),
            devices.len()
        );
    }
    Ok(report)
}

fn write_report<W: Write>(writer: &mut W, report: &SyncReport) -> Result<()> {
    for sync in &report.synced {
        writeln!(
            writer,
            "{}: fetched {}, staged {} new ({} duplicates, {} unlinked, {} before lookback)",
            sync.device,
            sync.fetched,
            sync.staged.inserted,
            sync.staged.duplicates,
            sync.staged.unlinked,
            sync.skipped_old,
        )?;
    }
    for failure in &report.failed {
        writeln!(writer, "{}: failed: {}", failure.device, failure.error)?;
    }
    write_summary(writer, &report.reconciled)
}

/// Pulls and stages every device in parallel. Failures are collected per
/// device and never abort the others.
fn stage_devices(config: &Config, devices: &[&DeviceConfig]) -> SyncReport {
    let results: Vec<(String, Result<DeviceSync>)> = devices
        .par_iter()
        .map(|device| (device.name.clone(), stage_device(config, device)))
        .collect();

    let mut report = SyncReport::default();
    for (device, result) in results {
        match result {
            Ok(sync) => report.synced.push(sync),
            Err(err) => {
                let error = format!("{err:#}");
                tracing::warn!(device = %device, error = %error, "device sync failed");
                report.failed.push(DeviceFailure { device, error });
            }
        }
    }
    report
}

fn stage_device(config: &Config, device_config: &DeviceConfig) -> Result<DeviceSync> {
    let terminal = TerminalName::new(device_config.name.as_str())?;
    let _lock = lock_device(&config.state_dir, &terminal)?;
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let fetched = match pull_device(config, device_config) {
        Ok(punches) => punches,
        Err(err) => {
            db.record_pull(&terminal, Utc::now(), Some(&format!("{err:#}")))?;
            return Err(err);
        }
    };

    let total = fetched.len();
    let today = Utc::now().with_timezone(&config.timezone).date_naive();
    let (recent, skipped_old) = within_lookback(fetched, config.lookback_days, today);
    let staged = db.stage_punches(Some(&terminal), &recent, config.timezone)?;
    db.record_pull(&terminal, Utc::now(), None)?;

    Ok(DeviceSync {
        device: terminal.to_string(),
        fetched: total,
        skipped_old,
        staged,
    })
}

fn pull_device(config: &Config, device_config: &DeviceConfig) -> Result<Vec<DevicePunch>> {
    let mut device = device_config.connect_with(config.device_timeout())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    let punches = runtime.block_on(att_device::pull(&mut device, config.device_timeout()))?;
    Ok(punches)
}

fn lock_path(state_dir: &Path, terminal: &TerminalName) -> PathBuf {
    let name: String = terminal
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    state_dir.join(format!("{name}.lock"))
}

/// Takes the terminal's lock, blocking while another pass holds it.
/// Released when the returned file is dropped.
fn lock_device(state_dir: &Path, terminal: &TerminalName) -> Result<File> {
    let path = lock_path(state_dir, terminal);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("failed to lock {}", path.display()))?;
    Ok(file)
}

/// Drops punches whose local date is more than `lookback_days` before
/// `today`. Returns the kept punches and how many were dropped.
fn within_lookback(
    punches: Vec<DevicePunch>,
    lookback_days: Option<u32>,
    today: NaiveDate,
) -> (Vec<DevicePunch>, usize) {
    let Some(days) = lookback_days else {
        return (punches, 0);
    };
    let earliest = today - Duration::days(i64::from(days));
    let total = punches.len();
    let recent: Vec<DevicePunch> = punches
        .into_iter()
        .filter(|punch| punch.timestamp.date() >= earliest)
        .collect();
    let skipped = total - recent.len();
    (recent, skipped)
}

//! Stage command: load an attendance log dump into the punch store.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use att_core::TerminalName;
use att_db::{Database, StageReport};

use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    file: &Path,
    device: &str,
) -> Result<StageReport> {
    let terminal = TerminalName::new(device)?;
    let content =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let punches = att_device::parse_attlog(&content)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    let report = db.stage_punches(Some(&terminal), &punches, config.timezone)?;
    writeln!(
        writer,
        "Staged {} new punches from {terminal} ({} duplicates, {} unlinked)",
        report.inserted, report.duplicates, report.unlinked
    )?;
    Ok(report)
}

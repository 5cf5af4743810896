//! Reconcile command: turn pending punches into attendance sessions.

use std::io::Write;

use anyhow::Result;
use att_core::ReconcileReport;
use att_db::Database;

use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    json: bool,
) -> Result<()> {
    let report = db.reconcile(&config.reconcile_config())?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_summary(writer, &report)?;
    }
    Ok(())
}

/// Writes a one-line summary of a reconciliation pass.
pub fn write_summary<W: Write>(writer: &mut W, report: &ReconcileReport) -> Result<()> {
    writeln!(
        writer,
        "Reconciled {} punches: {} opened, {} closed, {} orphan check-outs, {} repeated check-ins, {} already linked, {} abandoned sessions",
        report.processed,
        report.opened,
        report.closed,
        report.orphaned,
        report.repeated,
        report.already_linked,
        report.abandoned,
    )?;
    if report.failed > 0 {
        writeln!(
            writer,
            "{} punches failed and stay pending (see log)",
            report.failed
        )?;
    }
    Ok(())
}

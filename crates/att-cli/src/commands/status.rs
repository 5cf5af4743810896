//! Status command for monitoring terminal pulls and the reconciliation backlog.

use std::io::Write;

use anyhow::Result;
use att_db::{Database, PunchCounts, TerminalStatus};
use serde::Serialize;

use crate::Config;

#[derive(Debug, Serialize)]
struct StatusView<'a> {
    database: String,
    timezone: &'a str,
    punches: PunchCounts,
    terminals: Vec<TerminalStatus>,
}

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config, json: bool) -> Result<()> {
    let view = StatusView {
        database: config.database_path.display().to_string(),
        timezone: config.timezone.name(),
        punches: db.punch_counts()?,
        terminals: db.terminal_status()?,
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&view)?)?;
        return Ok(());
    }

    writeln!(writer, "Attendance status")?;
    writeln!(writer, "Database: {}", view.database)?;
    writeln!(writer, "Timezone: {}", view.timezone)?;
    writeln!(
        writer,
        "Punches: {} staged, {} pending, {} unlinked",
        view.punches.total, view.punches.pending, view.punches.unlinked
    )?;
    writeln!(writer, "Open sessions: {}", view.punches.open_sessions)?;

    if view.terminals.is_empty() {
        writeln!(writer, "No terminals pulled yet.")?;
        return Ok(());
    }

    writeln!(writer, "Terminals:")?;
    for terminal in &view.terminals {
        let pulled = terminal.last_pull_at.as_deref().unwrap_or("never");
        write!(
            writer,
            "- {}: last pull {pulled}, {} pending, {} unlinked",
            terminal.name, terminal.pending, terminal.unlinked
        )?;
        if let Some(error) = &terminal.last_error {
            write!(writer, ", last error: {error}")?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

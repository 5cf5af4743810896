//! Punches command for inspecting staged punches.

use std::io::Write;

use anyhow::Result;
use att_core::StagedPunch;
use att_db::{Database, PunchFilter};

use crate::Config;
use crate::commands::util::format_local;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    config: &Config,
    filter: PunchFilter,
    json: bool,
) -> Result<()> {
    let punches = db.list_punches(filter)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&punches)?)?;
        return Ok(());
    }

    if punches.is_empty() {
        writeln!(writer, "No punches.")?;
        return Ok(());
    }

    for punch in &punches {
        writeln!(
            writer,
            "{:<5} {:<8} {:<10} {}  {}",
            punch.id.get(),
            punch.device_user_id.as_str(),
            punch.terminal.as_ref().map_or("-", |terminal| terminal.as_str()),
            format_local(punch.punched_at, config.timezone),
            describe(punch),
        )?;
    }
    Ok(())
}

fn describe(punch: &StagedPunch) -> String {
    match (punch.employee, punch.session) {
        (None, _) => "unlinked".to_string(),
        (Some(_), Some(session)) if punch.processed => format!("session #{session}"),
        (Some(_), _) => "pending".to_string(),
    }
}

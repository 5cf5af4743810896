//! Explain command: show how a punch at a given time would be interpreted.

use std::io::Write;

use anyhow::{Result, bail};
use att_core::{DeviceUserId, PunchIntent, classify, interpret, normalize_timestamp, shift_window};
use att_db::Database;

use crate::Config;
use crate::commands::util::{format_local, parse_local};

const WALL_CLOCK: &str = "%Y-%m-%d %H:%M:%S";

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    config: &Config,
    employee: &str,
    at: &str,
) -> Result<()> {
    let number = DeviceUserId::new(employee)?;
    let Some(id) = db.find_employee(&number)? else {
        bail!("unknown employee {number}");
    };
    let schedule = db.schedule_for(id)?;
    let tz = config.timezone;
    let instant = normalize_timestamp(tz, parse_local(at)?);
    let local = instant.with_timezone(&tz);

    let shift = classify(&schedule, local.naive_local());
    let interpretation = interpret(&schedule, instant, &config.reconcile_config());
    let window = shift_window(&schedule, local);

    writeln!(
        writer,
        "Employee {number} at {} {}",
        local.format(WALL_CLOCK),
        tz.name()
    )?;
    writeln!(writer, "Shift: {}", interpretation.kind.as_str())?;
    let slots: Vec<String> = shift
        .slots
        .iter()
        .map(|slot| format!("{}-{}", slot.start.format("%H:%M"), slot.end.format("%H:%M")))
        .collect();
    if shift.fallback {
        writeln!(writer, "Slots: {} (no calendar, fallback window)", slots.join(", "))?;
    } else {
        writeln!(writer, "Slots: {}", slots.join(", "))?;
    }
    writeln!(
        writer,
        "Window: {} -> {}",
        window.start.format(WALL_CLOCK),
        window.end.format(WALL_CLOCK)
    )?;
    writeln!(writer, "Rule: {}", interpretation.rule.as_str())?;
    match interpretation.intent {
        PunchIntent::CheckIn { shift_since } => writeln!(
            writer,
            "Action: check-in, a session checked in since {} counts as the same shift",
            format_local(shift_since, tz)
        )?,
        PunchIntent::CheckOut {
            open_since: Some(since),
        } => writeln!(
            writer,
            "Action: check-out, closing the latest session checked in since {}",
            format_local(since, tz)
        )?,
        PunchIntent::CheckOut { open_since: None } => {
            writeln!(writer, "Action: check-out, closing the latest open session")?;
        }
    }
    Ok(())
}

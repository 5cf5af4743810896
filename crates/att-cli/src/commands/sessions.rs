//! Sessions command for listing attendance sessions.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Result, bail};
use att_core::{DeviceUserId, EmployeeId, SessionState};
use att_db::{Database, EmployeeRecord, SessionFilter};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Config;
use crate::commands::util::format_optional;

#[derive(Debug, Serialize)]
struct SessionView {
    id: i64,
    employee_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    employee_name: Option<String>,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    state: SessionState,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    config: &Config,
    open_only: bool,
    employee: Option<&str>,
    json: bool,
) -> Result<()> {
    let employees: HashMap<EmployeeId, EmployeeRecord> = db
        .list_employees()?
        .into_iter()
        .map(|record| (record.id, record))
        .collect();

    let employee = match employee {
        Some(number) => {
            let number = DeviceUserId::new(number)?;
            match db.find_employee(&number)? {
                Some(id) => Some(id),
                None => bail!("unknown employee {number}"),
            }
        }
        None => None,
    };

    let sessions = db.list_sessions(SessionFilter {
        employee,
        open_only,
    })?;
    let views: Vec<SessionView> = sessions
        .iter()
        .map(|session| {
            let record = employees.get(&session.employee);
            SessionView {
                id: session.id.get(),
                employee_number: record.map_or_else(
                    || session.employee.to_string(),
                    |record| record.employee_number.to_string(),
                ),
                employee_name: record.and_then(|record| record.name.clone()),
                check_in: session.check_in,
                check_out: session.check_out,
                state: session.state(),
            }
        })
        .collect();

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&views)?)?;
        return Ok(());
    }

    if views.is_empty() {
        writeln!(writer, "No sessions.")?;
        return Ok(());
    }

    let tz = config.timezone;
    for view in &views {
        writeln!(
            writer,
            "#{:<4} {:<8} {:<20} {:<19} -> {:<19}  {}",
            view.id,
            view.employee_number,
            view.employee_name.as_deref().unwrap_or("-"),
            format_optional(view.check_in, tz),
            format_optional(view.check_out, tz),
            view.state.as_str(),
        )?;
    }
    Ok(())
}

//! Directory command for loading employees and work calendars.
//!
//! The directory file is JSON:
//!
//! ```json
//! {
//!   "calendars": [
//!     {"name": "office", "slots": [
//!       {"weekday": 0, "hour_from": 8.5, "hour_to": "17:30"}
//!     ]}
//!   ],
//!   "employees": [
//!     {"employee_number": "100", "name": "Aye Aye", "calendars": ["office"]}
//!   ]
//! }
//! ```
//!
//! Weekdays count from 0 (Monday). Hours are fractional (`8.5`) or `HH:MM`.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use att_core::calendar::time_to_float_hour;
use att_core::{CalendarSlot, DeviceUserId};
use att_db::{CalendarDefinition, Database, DirectoryStats, EmployeeDefinition};
use chrono::NaiveTime;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    calendars: Vec<CalendarEntry>,
    #[serde(default)]
    employees: Vec<EmployeeEntry>,
}

#[derive(Debug, Deserialize)]
struct CalendarEntry {
    name: String,
    #[serde(default)]
    slots: Vec<SlotEntry>,
}

#[derive(Debug, Deserialize)]
struct SlotEntry {
    weekday: i64,
    hour_from: Hour,
    hour_to: Hour,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Hour {
    Fraction(f64),
    Clock(String),
}

impl Hour {
    fn as_fraction(&self) -> Result<f64> {
        match self {
            Self::Fraction(value) => Ok(*value),
            Self::Clock(text) if text.trim() == "24:00" => Ok(24.0),
            Self::Clock(text) => NaiveTime::parse_from_str(text.trim(), "%H:%M")
                .map(time_to_float_hour)
                .with_context(|| format!("invalid hour {text:?}, expected HH:MM")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmployeeEntry {
    employee_number: DeviceUserId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    calendars: Vec<String>,
}

fn parse_directory(content: &str) -> Result<(Vec<CalendarDefinition>, Vec<EmployeeDefinition>)> {
    let file: DirectoryFile = serde_json::from_str(content).context("invalid directory file")?;

    let mut calendars = Vec::with_capacity(file.calendars.len());
    for calendar in file.calendars {
        let mut slots = Vec::with_capacity(calendar.slots.len());
        for slot in &calendar.slots {
            let slot = CalendarSlot::from_float_hours(
                slot.weekday,
                slot.hour_from.as_fraction()?,
                slot.hour_to.as_fraction()?,
            )
            .with_context(|| format!("invalid slot in calendar {}", calendar.name))?;
            slots.push(slot);
        }
        calendars.push(CalendarDefinition {
            name: calendar.name,
            slots,
        });
    }

    let employees = file
        .employees
        .into_iter()
        .map(|employee| EmployeeDefinition {
            employee_number: employee.employee_number,
            name: employee.name,
            calendars: employee.calendars,
        })
        .collect();

    Ok((calendars, employees))
}

pub fn load<W: Write>(writer: &mut W, db: &mut Database, path: &Path) -> Result<DirectoryStats> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (calendars, employees) = parse_directory(&content)?;
    let stats = db
        .load_directory(&calendars, &employees)
        .with_context(|| format!("failed to load {}", path.display()))?;

    writeln!(
        writer,
        "Loaded {} calendars and {} employees ({} earlier punches linked)",
        stats.calendars, stats.employees, stats.punches_linked
    )?;
    Ok(stats)
}

//! Attendance log dumps copied off a terminal (`*_attlog.dat`).
//!
//! One punch per line, tab separated:
//!
//! ```text
//!     15	2025-03-03 08:59:12	1	0	0	0
//! ```
//!
//! user id, wall-clock timestamp, status code, verification code, then
//! terminal-specific columns that are ignored.

use std::path::{Path, PathBuf};

use att_core::{DevicePunch, DeviceUserId};

use crate::{Device, DeviceError, parse_device_timestamp};

/// A terminal read through its exported attendance log.
///
/// Disabling and enabling are no-ops: the file is a snapshot.
#[derive(Debug, Clone)]
pub struct ExportFileDevice {
    name: String,
    path: PathBuf,
}

impl ExportFileDevice {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> DeviceError {
        DeviceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Device for ExportFileDevice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), DeviceError> {
        tokio::fs::metadata(&self.path)
            .await
            .map_err(|err| self.io_error(err))?;
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<Vec<DevicePunch>, DeviceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| self.io_error(err))?;
        parse_attlog(&content)
    }

    async fn enable(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Parses an attendance log dump. Blank lines are skipped.
///
/// Lines without tabs are split on whitespace, with the date and time in
/// the second and third columns.
pub fn parse_attlog(content: &str) -> Result<Vec<DevicePunch>, DeviceError> {
    let mut punches = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        punches.push(parse_line(line).map_err(|message| DeviceError::InvalidRecord {
            line: idx + 1,
            message,
        })?);
    }
    Ok(punches)
}

fn parse_line(line: &str) -> Result<DevicePunch, String> {
    let fields: Vec<String> = if line.contains('\t') {
        line.split('\t').map(|field| field.trim().to_string()).collect()
    } else {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [user, date, time, rest @ ..] => [user.to_string(), format!("{date} {time}")]
                .into_iter()
                .chain(rest.iter().map(ToString::to_string))
                .collect(),
            _ => return Err("expected user id and timestamp".to_string()),
        }
    };

    let user_id = fields
        .first()
        .map(String::as_str)
        .ok_or_else(|| "missing user id".to_string())?;
    let user_id = DeviceUserId::new(user_id).map_err(|err| err.to_string())?;
    let raw_timestamp = fields
        .get(1)
        .ok_or_else(|| "missing timestamp".to_string())?;
    let timestamp = parse_device_timestamp(raw_timestamp)
        .ok_or_else(|| format!("invalid timestamp: {raw_timestamp}"))?;

    Ok(DevicePunch {
        user_id,
        timestamp,
        status: parse_code(fields.get(2).map(String::as_str))?,
        punch: parse_code(fields.get(3).map(String::as_str))?,
    })
}

fn parse_code(field: Option<&str>) -> Result<Option<i64>, String> {
    match field.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid code: {value}")),
    }
}

//! Storage layer for punch reconciliation.
//!
//! Provides persistence for staged punches, attendance sessions and the
//! read-only employee directory and work calendars, using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Terminals are pulled in parallel by giving every worker its own `Database`;
//! writers wait on each other through `SQLite`'s busy timeout.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). A single canonical format matters here:
//! - Lexicographic ordering matches chronological ordering
//! - Punch de-duplication and the "already materialized" lookup compare
//!   timestamps for equality
//!
//! ## Calendars
//!
//! Slots are stored as fractional hours (`8.5` = 08:30) and weekday indexes
//! (0 = Monday), and converted to [`CalendarSlot`] when read.

mod reconcile;

use std::path::Path;
use std::time::Duration;

use att_core::{
    AttendanceSession, CalendarSlot, DevicePunch, DeviceUserId, EmployeeId, PunchId, Schedule,
    SessionId, StagedPunch, TerminalName,
};
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {row}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        row: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row violates a domain rule.
    #[error("invalid {table} row {row}: {message}")]
    InvalidRow {
        table: &'static str,
        row: i64,
        message: String,
    },
    /// An employee references a calendar that was never defined.
    #[error("unknown calendar: {0}")]
    UnknownCalendar(String),
    /// A session changed between the query and the write.
    #[error("session {0} is no longer open")]
    SessionNotOpen(SessionId),
    /// A punch was processed by someone else while this pass held it.
    #[error("punch {0} was already processed")]
    PunchAlreadyProcessed(PunchId),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A calendar as delivered by the calendar configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDefinition {
    pub name: String,
    pub slots: Vec<CalendarSlot>,
}

/// An employee as delivered by the employee directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeDefinition {
    /// The user number the employee is enrolled under on the terminals.
    pub employee_number: DeviceUserId,
    pub name: Option<String>,
    /// Names of the calendars assigned to the employee.
    pub calendars: Vec<String>,
}

/// Summary of a directory load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub calendars: usize,
    pub employees: usize,
    /// Previously unresolved punches linked to an employee by this load.
    pub punches_linked: usize,
}

/// Summary of a staging batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub received: usize,
    pub inserted: usize,
    /// Punches already stored under the same device user and instant.
    pub duplicates: usize,
    /// Inserted punches whose device user is unknown to the directory.
    pub unlinked: usize,
}

/// Which staged punches to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PunchFilter {
    #[default]
    All,
    /// Linked to an employee but not yet reconciled.
    Pending,
    /// Not linked to any employee.
    Unlinked,
}

/// Which sessions to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub employee: Option<EmployeeId>,
    pub open_only: bool,
}

/// An employee as stored in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    pub employee_number: DeviceUserId,
    pub name: Option<String>,
}

/// Monitoring view of one terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalStatus {
    pub name: String,
    pub last_pull_at: Option<String>,
    pub last_error: Option<String>,
    pub pending: i64,
    pub unlinked: i64,
}

/// Punch counts across all terminals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PunchCounts {
    pub total: i64,
    pub pending: i64,
    pub unlinked: i64,
    pub open_sessions: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS employees (
                id INTEGER PRIMARY KEY,
                employee_number TEXT NOT NULL UNIQUE,
                name TEXT
            );

            CREATE TABLE IF NOT EXISTS calendars (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            -- weekday: 0 = Monday .. 6 = Sunday
            -- hour_from/hour_to: fractional hours, hour_to < hour_from crosses midnight
            CREATE TABLE IF NOT EXISTS calendar_slots (
                calendar_id INTEGER NOT NULL,
                weekday INTEGER NOT NULL CHECK (weekday BETWEEN 0 AND 6),
                hour_from REAL NOT NULL,
                hour_to REAL NOT NULL,
                FOREIGN KEY (calendar_id) REFERENCES calendars(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_calendar_slots_calendar ON calendar_slots(calendar_id);

            CREATE TABLE IF NOT EXISTS employee_calendars (
                employee_id INTEGER NOT NULL,
                calendar_id INTEGER NOT NULL,
                PRIMARY KEY (employee_id, calendar_id),
                FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE,
                FOREIGN KEY (calendar_id) REFERENCES calendars(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS attendance_sessions (
                id INTEGER PRIMARY KEY,
                employee_id INTEGER NOT NULL,
                check_in TEXT,
                check_out TEXT,
                abandoned INTEGER NOT NULL DEFAULT 0,
                CHECK (check_in IS NOT NULL OR check_out IS NOT NULL),
                FOREIGN KEY (employee_id) REFERENCES employees(id)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_employee_check_in
                ON attendance_sessions(employee_id, check_in);
            CREATE INDEX IF NOT EXISTS idx_sessions_employee_check_out
                ON attendance_sessions(employee_id, check_out);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_open
                ON attendance_sessions(employee_id)
                WHERE check_in IS NOT NULL AND check_out IS NULL AND abandoned = 0;

            -- Punches table: every punch a terminal ever reported, exactly once
            -- device_user_id: user number on the terminal
            -- punched_at: UTC, ISO 8601 (e.g., '2024-01-15T10:30:00.000Z')
            -- status/punch: terminal codes, informational only
            CREATE TABLE IF NOT EXISTS punches (
                id INTEGER PRIMARY KEY,
                device_user_id TEXT NOT NULL,
                punched_at TEXT NOT NULL,
                terminal TEXT,
                employee_id INTEGER,
                status INTEGER,
                punch INTEGER,
                processed INTEGER NOT NULL DEFAULT 0,
                session_id INTEGER,
                staged_at TEXT NOT NULL,
                UNIQUE (device_user_id, punched_at),
                FOREIGN KEY (employee_id) REFERENCES employees(id),
                FOREIGN KEY (session_id) REFERENCES attendance_sessions(id)
            );

            CREATE INDEX IF NOT EXISTS idx_punches_pending ON punches(processed, punched_at);
            CREATE INDEX IF NOT EXISTS idx_punches_employee ON punches(employee_id);
            CREATE INDEX IF NOT EXISTS idx_punches_terminal ON punches(terminal);

            CREATE TABLE IF NOT EXISTS terminals (
                name TEXT PRIMARY KEY,
                last_pull_at TEXT,
                last_error TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Replaces calendars and employees with the given definitions.
    ///
    /// Calendars and employees are matched by name and employee number;
    /// their slots and calendar assignments are rewritten. Unresolved punches
    /// of newly known employees are linked afterwards.
    pub fn load_directory(
        &mut self,
        calendars: &[CalendarDefinition],
        employees: &[EmployeeDefinition],
    ) -> Result<DirectoryStats, DbError> {
        let tx = self.conn.transaction()?;
        for calendar in calendars {
            tx.execute(
                "INSERT INTO calendars (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
                params![calendar.name],
            )?;
            let calendar_id: i64 = tx.query_row(
                "SELECT id FROM calendars WHERE name = ?",
                params![calendar.name],
                |row| row.get(0),
            )?;
            tx.execute(
                "DELETE FROM calendar_slots WHERE calendar_id = ?",
                params![calendar_id],
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO calendar_slots (calendar_id, weekday, hour_from, hour_to) VALUES (?, ?, ?, ?)",
            )?;
            for slot in &calendar.slots {
                stmt.execute(params![
                    calendar_id,
                    slot.weekday.num_days_from_monday(),
                    att_core::calendar::time_to_float_hour(slot.start),
                    att_core::calendar::time_to_float_hour(slot.end),
                ])?;
            }
        }

        for employee in employees {
            tx.execute(
                "
                INSERT INTO employees (employee_number, name) VALUES (?, ?)
                ON CONFLICT(employee_number) DO UPDATE SET name = COALESCE(excluded.name, employees.name)
                ",
                params![employee.employee_number.as_str(), employee.name],
            )?;
            let employee_id: i64 = tx.query_row(
                "SELECT id FROM employees WHERE employee_number = ?",
                params![employee.employee_number.as_str()],
                |row| row.get(0),
            )?;
            tx.execute(
                "DELETE FROM employee_calendars WHERE employee_id = ?",
                params![employee_id],
            )?;
            for name in &employee.calendars {
                let calendar_id: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM calendars WHERE name = ?",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()?;
                let calendar_id = calendar_id.ok_or_else(|| DbError::UnknownCalendar(name.clone()))?;
                tx.execute(
                    "INSERT OR IGNORE INTO employee_calendars (employee_id, calendar_id) VALUES (?, ?)",
                    params![employee_id, calendar_id],
                )?;
            }
        }
        tx.commit()?;

        let punches_linked = self.resolve_unlinked()?;
        tracing::info!(
            calendars = calendars.len(),
            employees = employees.len(),
            punches_linked,
            "loaded directory"
        );
        Ok(DirectoryStats {
            calendars: calendars.len(),
            employees: employees.len(),
            punches_linked,
        })
    }

    /// Resolves a terminal user number to an employee.
    pub fn find_employee(&self, employee_number: &DeviceUserId) -> Result<Option<EmployeeId>, DbError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM employees WHERE employee_number = ?",
                params![employee_number.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(EmployeeId))
    }

    /// Lists the employee directory ordered by employee number.
    pub fn list_employees(&self) -> Result<Vec<EmployeeRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, employee_number, name FROM employees ORDER BY employee_number ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        let mut employees = Vec::new();
        for row in rows {
            let (id, number, name) = row?;
            let employee_number = DeviceUserId::new(number).map_err(|err| DbError::InvalidRow {
                table: "employees",
                row: id,
                message: err.to_string(),
            })?;
            employees.push(EmployeeRecord {
                id: EmployeeId(id),
                employee_number,
                name,
            });
        }
        Ok(employees)
    }

    /// Loads every calendar slot assigned to `employee`.
    pub fn schedule_for(&self, employee: EmployeeId) -> Result<Schedule, DbError> {
        load_schedule(&self.conn, employee)
    }

    /// Stages punches read from a terminal.
    ///
    /// Timestamps are read as wall-clock time in `tz` and stored in UTC.
    /// A punch already stored under the same device user and instant is
    /// silently skipped, so re-delivering a batch has no effect.
    pub fn stage_punches(
        &mut self,
        terminal: Option<&TerminalName>,
        punches: &[DevicePunch],
        tz: Tz,
    ) -> Result<StageReport, DbError> {
        let mut report = StageReport {
            received: punches.len(),
            ..StageReport::default()
        };
        if punches.is_empty() {
            return Ok(report);
        }
        let staged_at = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        {
            let mut lookup = tx.prepare("SELECT id FROM employees WHERE employee_number = ?")?;
            let mut insert = tx.prepare(
                "
                INSERT OR IGNORE INTO punches
                (device_user_id, punched_at, terminal, employee_id, status, punch, staged_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for punch in punches {
                let employee_id: Option<i64> = lookup
                    .query_row(params![punch.user_id.as_str()], |row| row.get(0))
                    .optional()?;
                let inserted = insert.execute(params![
                    punch.user_id.as_str(),
                    format_timestamp(punch.instant(tz)),
                    terminal.map(TerminalName::as_str),
                    employee_id,
                    punch.status,
                    punch.punch,
                    staged_at,
                ])?;
                if inserted == 0 {
                    report.duplicates += 1;
                    continue;
                }
                report.inserted += 1;
                if employee_id.is_none() {
                    tracing::debug!(user_id = %punch.user_id, "staged punch for unknown device user");
                    report.unlinked += 1;
                }
            }
        }
        tx.commit()?;
        tracing::info!(
            terminal = terminal.map(TerminalName::as_str),
            received = report.received,
            inserted = report.inserted,
            duplicates = report.duplicates,
            unlinked = report.unlinked,
            "staged punches"
        );
        Ok(report)
    }

    /// Links unresolved punches whose device user is now in the directory.
    pub fn resolve_unlinked(&mut self) -> Result<usize, DbError> {
        let linked = self.conn.execute(
            "
            UPDATE punches
            SET employee_id = (
                SELECT e.id FROM employees e WHERE e.employee_number = punches.device_user_id
            )
            WHERE employee_id IS NULL
              AND processed = 0
              AND EXISTS (
                SELECT 1 FROM employees e WHERE e.employee_number = punches.device_user_id
              )
            ",
            [],
        )?;
        if linked > 0 {
            tracing::info!(linked, "linked previously unresolved punches");
        }
        Ok(linked)
    }

    /// Lists staged punches ordered by timestamp then ID.
    pub fn list_punches(&self, filter: PunchFilter) -> Result<Vec<StagedPunch>, DbError> {
        let condition = match filter {
            PunchFilter::All => "1 = 1",
            PunchFilter::Pending => "processed = 0 AND employee_id IS NOT NULL",
            PunchFilter::Unlinked => "employee_id IS NULL",
        };
        let sql = format!(
            "
            SELECT id, device_user_id, terminal, employee_id, punched_at, status, punch, processed, session_id
            FROM punches
            WHERE {condition}
            ORDER BY punched_at ASC, id ASC
            "
        );
        self.query_punches(&sql)
    }

    fn query_punches(&self, sql: &str) -> Result<Vec<StagedPunch>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(PunchRow {
                id: row.get(0)?,
                device_user_id: row.get(1)?,
                terminal: row.get(2)?,
                employee_id: row.get(3)?,
                punched_at: row.get(4)?,
                status: row.get(5)?,
                punch: row.get(6)?,
                processed: row.get(7)?,
                session_id: row.get(8)?,
            })
        })?;
        let mut punches = Vec::new();
        for row in rows {
            punches.push(row?.into_staged()?);
        }
        Ok(punches)
    }

    /// Lists sessions ordered by their first timestamp.
    pub fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<AttendanceSession>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, employee_id, check_in, check_out, abandoned
            FROM attendance_sessions
            WHERE (?1 IS NULL OR employee_id = ?1)
              AND (?2 = 0 OR (check_in IS NOT NULL AND check_out IS NULL AND abandoned = 0))
            ORDER BY COALESCE(check_in, check_out) ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![filter.employee.map(EmployeeId::get), filter.open_only],
            SessionRow::from_row,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// Lists sessions that touch `[start, end)` by check-in or check-out.
    pub fn list_sessions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AttendanceSession>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT id, employee_id, check_in, check_out, abandoned
            FROM attendance_sessions
            WHERE COALESCE(check_in, check_out) >= ?1 AND COALESCE(check_in, check_out) < ?2
            ORDER BY COALESCE(check_in, check_out) ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![format_timestamp(start), format_timestamp(end)],
            SessionRow::from_row,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// Records the outcome of a terminal pull for monitoring.
    pub fn record_pull(
        &mut self,
        terminal: &TerminalName,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO terminals (name, last_pull_at, last_error) VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                last_pull_at = CASE WHEN ?3 IS NULL THEN excluded.last_pull_at ELSE terminals.last_pull_at END,
                last_error = ?3
            ",
            params![
                terminal.as_str(),
                error.is_none().then(|| format_timestamp(at)),
                error
            ],
        )?;
        Ok(())
    }

    /// Lists per-terminal pull and backlog information, ordered by name.
    pub fn terminal_status(&self) -> Result<Vec<TerminalStatus>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT
                t.name,
                t.last_pull_at,
                t.last_error,
                (SELECT COUNT(*) FROM punches p
                 WHERE p.terminal = t.name AND p.processed = 0 AND p.employee_id IS NOT NULL),
                (SELECT COUNT(*) FROM punches p
                 WHERE p.terminal = t.name AND p.employee_id IS NULL)
            FROM terminals t
            ORDER BY t.name ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TerminalStatus {
                name: row.get(0)?,
                last_pull_at: row.get(1)?,
                last_error: row.get(2)?,
                pending: row.get(3)?,
                unlinked: row.get(4)?,
            })
        })?;
        let mut terminals = Vec::new();
        for row in rows {
            terminals.push(row?);
        }
        Ok(terminals)
    }

    /// Counts punches by reconciliation state and open sessions.
    pub fn punch_counts(&self) -> Result<PunchCounts, DbError> {
        let counts = self.conn.query_row(
            "
            SELECT
                (SELECT COUNT(*) FROM punches),
                (SELECT COUNT(*) FROM punches WHERE processed = 0 AND employee_id IS NOT NULL),
                (SELECT COUNT(*) FROM punches WHERE employee_id IS NULL),
                (SELECT COUNT(*) FROM attendance_sessions
                 WHERE check_in IS NOT NULL AND check_out IS NULL AND abandoned = 0)
            ",
            [],
            |row| {
                Ok(PunchCounts {
                    total: row.get(0)?,
                    pending: row.get(1)?,
                    unlinked: row.get(2)?,
                    open_sessions: row.get(3)?,
                })
            },
        )?;
        Ok(counts)
    }
}

fn load_schedule(conn: &Connection, employee: EmployeeId) -> Result<Schedule, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT cs.calendar_id, cs.weekday, cs.hour_from, cs.hour_to
        FROM employee_calendars ec
        JOIN calendar_slots cs ON cs.calendar_id = ec.calendar_id
        WHERE ec.employee_id = ?
        ",
    )?;
    let rows = stmt.query_map(params![employee.get()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;
    let mut slots = Vec::new();
    for row in rows {
        let (calendar_id, weekday, hour_from, hour_to) = row?;
        let slot = CalendarSlot::from_float_hours(weekday, hour_from, hour_to).map_err(|err| {
            DbError::InvalidRow {
                table: "calendar_slots",
                row: calendar_id,
                message: err.to_string(),
            }
        })?;
        slots.push(slot);
    }
    Ok(Schedule::new(slots))
}

#[derive(Debug)]
struct PunchRow {
    id: i64,
    device_user_id: String,
    terminal: Option<String>,
    employee_id: Option<i64>,
    punched_at: String,
    status: Option<i64>,
    punch: Option<i64>,
    processed: bool,
    session_id: Option<i64>,
}

impl PunchRow {
    fn into_staged(self) -> Result<StagedPunch, DbError> {
        let invalid = |message: String| DbError::InvalidRow {
            table: "punches",
            row: self.id,
            message,
        };
        let device_user_id =
            DeviceUserId::new(self.device_user_id.clone()).map_err(|err| invalid(err.to_string()))?;
        let terminal = self
            .terminal
            .clone()
            .map(TerminalName::new)
            .transpose()
            .map_err(|err| invalid(err.to_string()))?;
        Ok(StagedPunch {
            id: PunchId(self.id),
            device_user_id,
            terminal,
            employee: self.employee_id.map(EmployeeId),
            punched_at: parse_timestamp(&self.punched_at, "punches", self.id)?,
            status: self.status,
            punch: self.punch,
            processed: self.processed,
            session: self.session_id.map(SessionId),
        })
    }
}

#[derive(Debug)]
struct SessionRow {
    id: i64,
    employee_id: i64,
    check_in: Option<String>,
    check_out: Option<String>,
    abandoned: bool,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            check_in: row.get(2)?,
            check_out: row.get(3)?,
            abandoned: row.get(4)?,
        })
    }

    fn into_session(self) -> Result<AttendanceSession, DbError> {
        let parse = |value: Option<&String>| {
            value
                .map(|ts| parse_timestamp(ts, "attendance_sessions", self.id))
                .transpose()
        };
        Ok(AttendanceSession {
            id: SessionId(self.id),
            employee: EmployeeId(self.employee_id),
            check_in: parse(self.check_in.as_ref())?,
            check_out: parse(self.check_out.as_ref())?,
            abandoned: self.abandoned,
        })
    }
}

fn parse_timestamp(timestamp: &str, table: &'static str, row: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            row,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

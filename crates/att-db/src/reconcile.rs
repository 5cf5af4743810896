//! Reconciliation passes against the `SQLite` session store.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use att_core::{
    AttendanceSession, EmployeeId, PendingPunch, PunchId, ReconcileConfig, ReconcileReport,
    Schedule, SessionId, SessionStore, apply_punch, sort_for_reconciliation,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{Database, DbError, PunchFilter, SessionRow, format_timestamp, load_schedule};

/// [`SessionStore`] over one connection or transaction.
struct SqlSessions<'c>(&'c Connection);

impl SqlSessions<'_> {
    fn insert(
        &self,
        employee: EmployeeId,
        check_in: Option<DateTime<Utc>>,
        check_out: Option<DateTime<Utc>>,
    ) -> Result<SessionId, DbError> {
        self.0.execute(
            "INSERT INTO attendance_sessions (employee_id, check_in, check_out) VALUES (?, ?, ?)",
            params![
                employee.get(),
                check_in.map(format_timestamp),
                check_out.map(format_timestamp)
            ],
        )?;
        Ok(SessionId(self.0.last_insert_rowid()))
    }
}

impl SessionStore for SqlSessions<'_> {
    type Error = DbError;

    fn session_touching(
        &self,
        employee: EmployeeId,
        at: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, DbError> {
        let at = format_timestamp(at);
        let row = self
            .0
            .query_row(
                "
                SELECT id, employee_id, check_in, check_out, abandoned
                FROM attendance_sessions
                WHERE employee_id = ?1 AND (check_in = ?2 OR check_out = ?2)
                ORDER BY id ASC
                LIMIT 1
                ",
                params![employee.get(), at],
                SessionRow::from_row,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    fn latest_open(
        &self,
        employee: EmployeeId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<AttendanceSession>, DbError> {
        let row = self
            .0
            .query_row(
                "
                SELECT id, employee_id, check_in, check_out, abandoned
                FROM attendance_sessions
                WHERE employee_id = ?1
                  AND check_in IS NOT NULL
                  AND check_out IS NULL
                  AND abandoned = 0
                  AND (?2 IS NULL OR check_in >= ?2)
                ORDER BY check_in DESC, id DESC
                LIMIT 1
                ",
                params![employee.get(), since.map(format_timestamp)],
                SessionRow::from_row,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    fn open_session(
        &mut self,
        employee: EmployeeId,
        check_in: DateTime<Utc>,
    ) -> Result<SessionId, DbError> {
        self.insert(employee, Some(check_in), None)
    }

    fn orphan_check_out(
        &mut self,
        employee: EmployeeId,
        check_out: DateTime<Utc>,
    ) -> Result<SessionId, DbError> {
        self.insert(employee, None, Some(check_out))
    }

    fn close_session(&mut self, id: SessionId, check_out: DateTime<Utc>) -> Result<(), DbError> {
        let updated = self.0.execute(
            "
            UPDATE attendance_sessions SET check_out = ?
            WHERE id = ? AND check_out IS NULL AND abandoned = 0
            ",
            params![format_timestamp(check_out), id.get()],
        )?;
        if updated == 0 {
            return Err(DbError::SessionNotOpen(id));
        }
        Ok(())
    }

    fn abandon_session(&mut self, id: SessionId) -> Result<(), DbError> {
        let updated = self.0.execute(
            "UPDATE attendance_sessions SET abandoned = 1 WHERE id = ? AND check_out IS NULL AND abandoned = 0",
            params![id.get()],
        )?;
        if updated == 0 {
            return Err(DbError::SessionNotOpen(id));
        }
        Ok(())
    }

    fn mark_processed(&mut self, punch: PunchId, session: SessionId) -> Result<(), DbError> {
        let updated = self.0.execute(
            "UPDATE punches SET processed = 1, session_id = ? WHERE id = ? AND processed = 0",
            params![session.get(), punch.get()],
        )?;
        if updated == 0 {
            return Err(DbError::PunchAlreadyProcessed(punch));
        }
        Ok(())
    }
}

impl Database {
    /// Reconciles every pending punch across all terminals.
    ///
    /// Punches are applied in ascending timestamp order, each in its own
    /// transaction. A punch that fails, including failing to begin its
    /// transaction, is rolled back, logged and left unprocessed for the next
    /// pass; the remaining punches still run.
    pub fn reconcile(&mut self, config: &ReconcileConfig) -> Result<ReconcileReport, DbError> {
        self.resolve_unlinked()?;
        let mut punches = self.list_punches(PunchFilter::Pending)?;
        sort_for_reconciliation(&mut punches);

        let mut schedules: HashMap<EmployeeId, Schedule> = HashMap::new();
        let mut report = ReconcileReport::default();

        for staged in &punches {
            let Some(pending) = PendingPunch::from_staged(staged) else {
                continue;
            };
            let schedule = match schedules.entry(pending.employee) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => match load_schedule(&self.conn, pending.employee) {
                    Ok(schedule) => entry.insert(schedule),
                    Err(err) => {
                        tracing::warn!(
                            punch = %pending.id,
                            employee = %pending.employee,
                            error = %err,
                            "failed to load calendars, leaving punch pending"
                        );
                        report.failed += 1;
                        continue;
                    }
                },
            };

            let result = self.conn.transaction().map_err(DbError::from).and_then(|tx| {
                let outcome = apply_punch(&mut SqlSessions(&tx), schedule, pending, config)?;
                tx.commit()?;
                Ok(outcome)
            });
            match result {
                Ok(outcome) => {
                    tracing::debug!(
                        punch = %outcome.punch,
                        session = %outcome.session,
                        action = ?outcome.action,
                        "reconciled punch"
                    );
                    report.record(&outcome);
                }
                Err(err) => {
                    tracing::warn!(
                        punch = %pending.id,
                        employee = %pending.employee,
                        error = %err,
                        "failed to reconcile punch, leaving it pending"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            opened = report.opened,
            closed = report.closed,
            orphaned = report.orphaned,
            repeated = report.repeated,
            abandoned = report.abandoned,
            failed = report.failed,
            "reconciliation pass finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{device_punch, seed_directory};
    use crate::SessionFilter;
    use att_core::{DeviceUserId, SessionState, TerminalName};
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn utc(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
    }

    fn employee(db: &Database, number: &str) -> EmployeeId {
        db.find_employee(&DeviceUserId::new(number).unwrap())
            .unwrap()
            .unwrap()
    }

    fn sessions_of(db: &Database, number: &str) -> Vec<AttendanceSession> {
        db.list_sessions(SessionFilter {
            employee: Some(employee(db, number)),
            open_only: false,
        })
        .unwrap()
    }

    #[test]
    fn day_shift_round_trip() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(
            None,
            &[device_punch("100", 3, 9, 5), device_punch("100", 3, 18, 10)],
            Tz::UTC,
        )
        .unwrap();

        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.opened, 1);
        assert_eq!(report.closed, 1);

        let sessions = sessions_of(&db, "100");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].check_in, Some(utc(3, 9, 5)));
        assert_eq!(sessions[0].check_out, Some(utc(3, 18, 10)));

        let punches = db.list_punches(PunchFilter::All).unwrap();
        assert!(punches.iter().all(|p| p.processed && p.session == Some(sessions[0].id)));
    }

    #[test]
    fn night_shift_spans_midnight() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(
            None,
            &[device_punch("200", 3, 21, 0), device_punch("200", 4, 4, 30)],
            Tz::UTC,
        )
        .unwrap();

        db.reconcile(&ReconcileConfig::default()).unwrap();
        let sessions = sessions_of(&db, "200");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].state(), SessionState::Closed);
        assert_eq!(sessions[0].check_in, Some(utc(3, 21, 0)));
        assert_eq!(sessions[0].check_out, Some(utc(4, 4, 30)));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        let punches = [device_punch("100", 3, 9, 0), device_punch("100", 3, 18, 0)];
        db.stage_punches(None, &punches, Tz::UTC).unwrap();
        db.reconcile(&ReconcileConfig::default()).unwrap();

        db.stage_punches(None, &punches, Tz::UTC).unwrap();
        let second = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(second, ReconcileReport::default());
        assert_eq!(sessions_of(&db, "100").len(), 1);
    }

    #[test]
    fn materialized_punch_is_linked_after_reset() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(None, &[device_punch("100", 3, 9, 0)], Tz::UTC)
            .unwrap();
        db.reconcile(&ReconcileConfig::default()).unwrap();

        // A crash between the session write and the processed flag.
        db.conn
            .execute("UPDATE punches SET processed = 0, session_id = NULL", [])
            .unwrap();
        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.already_linked, 1);
        assert_eq!(sessions_of(&db, "100").len(), 1);
    }

    #[test]
    fn staging_order_does_not_matter() {
        let punches = [
            device_punch("100", 3, 9, 0),
            device_punch("100", 3, 13, 5),
            device_punch("100", 3, 14, 0),
            device_punch("100", 3, 18, 0),
        ];

        let mut forward = Database::open_in_memory().unwrap();
        seed_directory(&mut forward);
        forward.stage_punches(None, &punches, Tz::UTC).unwrap();
        forward.reconcile(&ReconcileConfig::default()).unwrap();

        let mut reversed = Database::open_in_memory().unwrap();
        seed_directory(&mut reversed);
        let mut backwards = punches.to_vec();
        backwards.reverse();
        reversed.stage_punches(None, &backwards, Tz::UTC).unwrap();
        reversed.reconcile(&ReconcileConfig::default()).unwrap();

        let strip = |sessions: Vec<AttendanceSession>| {
            sessions
                .into_iter()
                .map(|s| (s.check_in, s.check_out, s.abandoned))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            strip(sessions_of(&forward, "100")),
            strip(sessions_of(&reversed, "100"))
        );
    }

    #[test]
    fn at_most_one_open_session_per_employee() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(
            None,
            &[
                device_punch("100", 3, 9, 0),
                device_punch("100", 4, 9, 0),
                device_punch("100", 5, 9, 0),
            ],
            Tz::UTC,
        )
        .unwrap();

        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.opened, 3);
        assert_eq!(report.abandoned, 2);

        let open = db
            .list_sessions(SessionFilter {
                employee: Some(employee(&db, "100")),
                open_only: true,
            })
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].check_in, Some(utc(5, 9, 0)));
    }

    #[test]
    fn unlinked_punches_wait_for_directory() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(None, &[device_punch("555", 3, 9, 0)], Tz::UTC)
            .unwrap();

        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(db.list_punches(PunchFilter::Unlinked).unwrap().len(), 1);
    }

    #[test]
    fn punches_from_different_terminals_pair_in_time_order() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        let gate = TerminalName::new("gate").unwrap();
        let dock = TerminalName::new("dock").unwrap();
        // The check-out terminal is staged first.
        db.stage_punches(Some(&dock), &[device_punch("100", 3, 18, 0)], Tz::UTC)
            .unwrap();
        db.stage_punches(Some(&gate), &[device_punch("100", 3, 9, 0)], Tz::UTC)
            .unwrap();

        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.opened, 1);
        assert_eq!(report.closed, 1);
        assert_eq!(report.orphaned, 0);

        let sessions = db.list_sessions(SessionFilter::default()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].state(), SessionState::Closed);
    }

    #[test]
    fn failed_transaction_begin_leaves_punches_pending() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(
            None,
            &[device_punch("100", 3, 9, 0), device_punch("100", 3, 18, 0)],
            Tz::UTC,
        )
        .unwrap();

        // A transaction already open makes every per-punch BEGIN fail.
        db.conn.execute_batch("BEGIN").unwrap();
        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.processed, 0);
        db.conn.execute_batch("ROLLBACK").unwrap();

        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.closed, 1);
    }

    #[test]
    fn failed_punch_stays_pending() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(None, &[device_punch("100", 3, 9, 0)], Tz::UTC)
            .unwrap();
        db.conn
            .execute(
                "UPDATE calendar_slots SET hour_from = 99 WHERE weekday = 0",
                [],
            )
            .unwrap();

        let report = db.reconcile(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 0);
        assert_eq!(db.punch_counts().unwrap().pending, 1);

        let err = db.schedule_for(employee(&db, "100")).unwrap_err();
        assert!(matches!(err, DbError::InvalidRow { table: "calendar_slots", .. }));
    }

    #[test]
    fn stale_open_session_is_reported_not_closed() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(None, &[device_punch("100", 3, 9, 0)], Tz::UTC)
            .unwrap();
        db.reconcile(&ReconcileConfig::default()).unwrap();
        let open = db
            .list_sessions(SessionFilter {
                employee: None,
                open_only: true,
            })
            .unwrap();
        assert_eq!(open.len(), 1);

        let mut store = SqlSessions(&db.conn);
        store.close_session(open[0].id, utc(3, 18, 0)).unwrap();
        let err = store.close_session(open[0].id, utc(3, 19, 0)).unwrap_err();
        assert!(matches!(err, DbError::SessionNotOpen(id) if id == open[0].id));
    }

    #[test]
    fn sessions_in_range_use_first_timestamp() {
        let mut db = Database::open_in_memory().unwrap();
        seed_directory(&mut db);
        db.stage_punches(
            None,
            &[device_punch("100", 3, 9, 0), device_punch("100", 4, 18, 30)],
            Tz::UTC,
        )
        .unwrap();
        db.reconcile(&ReconcileConfig::default()).unwrap();

        let monday = db.list_sessions_in_range(utc(3, 0, 0), utc(4, 0, 0)).unwrap();
        assert_eq!(monday.len(), 1);
        let tuesday = db.list_sessions_in_range(utc(4, 0, 0), utc(5, 0, 0)).unwrap();
        assert_eq!(tuesday.len(), 1);
        assert_eq!(tuesday[0].state(), SessionState::OrphanCheckOut);
    }
}

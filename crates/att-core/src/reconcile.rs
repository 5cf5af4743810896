//! Punch reconciliation: mapping staged punches onto attendance sessions.
//!
//! # Algorithm Summary
//!
//! For each unprocessed punch, in ascending timestamp order:
//!
//! 1. If a session of the employee already carries the punch instant as its
//!    check-in or check-out, the punch was materialized by an earlier pass;
//!    link it and stop.
//! 2. Classify the shift of the punch's calendar date and interpret the punch
//!    as a check-in or a check-out ([`interpret`]).
//! 3. A check-in opens a session. A check-out closes the most recent open
//!    session, or records an orphan check-out when nothing is open.
//! 4. Mark the punch processed and link it to the resulting session.
//!
//! Per employee this is a two-state machine: no open session, or exactly one
//! open session. A check-in that finds a session still open from the same
//! shift is a repeated punch and is linked to it. One that finds a session
//! left open by an earlier shift abandons it first, since a check-out is
//! never fabricated.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::Schedule;
use crate::punch::StagedPunch;
use crate::session::AttendanceSession;
use crate::shift::{ShiftKind, classify};
use crate::types::{EmployeeId, PunchId, SessionId};
use crate::window::{ShiftWindow, localize, night_window};

/// How long before a night shift's start a punch still counts as check-in.
pub const CHECKIN_LEAD: Duration = Duration::hours(2);

/// How long after a night shift's start a punch still counts as check-in.
pub const CHECKIN_GRACE: Duration = Duration::hours(4);

/// How long after a night shift's end a punch counts as its check-out.
pub const CHECKOUT_GRACE: Duration = Duration::hours(2);

/// Configuration for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Timezone the terminals' wall clocks and the calendars run on.
    pub timezone: Tz,

    /// Whether a day-shift check-out may close a session opened on an
    /// earlier calendar day. Default: `false` (same-day sessions only).
    pub cross_day_checkout: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            cross_day_checkout: false,
        }
    }
}

/// Which branch of the classification rules matched a punch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Day shift, at or before the end of the first slot.
    DayFirstSlot,
    /// Day shift, within the second slot.
    DaySecondSlot,
    /// Day shift, after every slot it was compared against.
    DayFinal,
    /// Night shift, inside the check-in window around the shift start.
    NightCheckIn,
    /// Night shift, before the check-out cutoff.
    NightCheckOut,
    /// Night shift, after the check-out cutoff.
    NightTrailing,
}

impl Rule {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DayFirstSlot => "day_first_slot",
            Self::DaySecondSlot => "day_second_slot",
            Self::DayFinal => "day_final",
            Self::NightCheckIn => "night_check_in",
            Self::NightCheckOut => "night_check_out",
            Self::NightTrailing => "night_trailing",
        }
    }
}

/// What a punch means for the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchIntent {
    /// Open a session. An open session checked in at or after `shift_since`
    /// belongs to the same shift.
    CheckIn { shift_since: DateTime<Utc> },
    /// Close the most recent open session checked in at or after
    /// `open_since` (any, when `None`).
    CheckOut { open_since: Option<DateTime<Utc>> },
}

/// The interpretation of one punch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpretation {
    pub kind: ShiftKind,
    pub rule: Rule,
    pub intent: PunchIntent,
    /// The night window the punch was placed in. `None` for day shifts.
    pub window: Option<ShiftWindow>,
}

/// Interprets a punch as a check-in or a check-out. Pure.
pub fn interpret(
    schedule: &Schedule,
    punch: DateTime<Utc>,
    config: &ReconcileConfig,
) -> Interpretation {
    let local = punch.with_timezone(&config.timezone);
    let shift = classify(schedule, local.naive_local());

    match shift.kind {
        ShiftKind::Day => {
            let midnight = localize(
                config.timezone,
                local.date_naive().and_time(NaiveTime::MIN),
            )
            .with_timezone(&Utc);
            let time = local.time();
            let first_end = shift.slots.first().map(|slot| slot.end);
            let second_end = shift.slots.get(1).map(|slot| slot.end);

            let (rule, intent) = match (first_end, second_end) {
                (Some(first_end), _) if time <= first_end => (
                    Rule::DayFirstSlot,
                    PunchIntent::CheckIn {
                        shift_since: midnight,
                    },
                ),
                (Some(_), Some(second_end)) if time <= second_end => (
                    Rule::DaySecondSlot,
                    PunchIntent::CheckOut {
                        open_since: Some(midnight),
                    },
                ),
                _ => (
                    Rule::DayFinal,
                    PunchIntent::CheckOut {
                        open_since: (!config.cross_day_checkout).then_some(midnight),
                    },
                ),
            };
            Interpretation {
                kind: ShiftKind::Day,
                rule,
                intent,
                window: None,
            }
        }
        ShiftKind::Night => {
            let window = night_window(schedule, local);
            let checkin_start = window.start - CHECKIN_LEAD;
            let checkin_end = window.start + CHECKIN_GRACE;
            let checkout_cutoff = window.end + CHECKOUT_GRACE;

            let (rule, intent) = if local >= checkin_start && local <= checkin_end {
                (
                    Rule::NightCheckIn,
                    PunchIntent::CheckIn {
                        shift_since: checkin_start.with_timezone(&Utc),
                    },
                )
            } else if local <= checkout_cutoff {
                (
                    Rule::NightCheckOut,
                    PunchIntent::CheckOut { open_since: None },
                )
            } else {
                (
                    Rule::NightTrailing,
                    PunchIntent::CheckOut { open_since: None },
                )
            };
            Interpretation {
                kind: ShiftKind::Night,
                rule,
                intent,
                window: Some(window),
            }
        }
    }
}

/// Read/write access to attendance sessions for one punch.
///
/// Implementations must read fresh state on every call; the engine re-queries
/// the open session right before closing it instead of caching it.
pub trait SessionStore {
    type Error;

    /// A session of `employee` whose check-in or check-out equals `at`.
    fn session_touching(
        &self,
        employee: EmployeeId,
        at: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, Self::Error>;

    /// The open session of `employee` with the latest check-in, restricted
    /// to check-ins at or after `since` when given.
    fn latest_open(
        &self,
        employee: EmployeeId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<AttendanceSession>, Self::Error>;

    fn open_session(
        &mut self,
        employee: EmployeeId,
        check_in: DateTime<Utc>,
    ) -> Result<SessionId, Self::Error>;

    fn orphan_check_out(
        &mut self,
        employee: EmployeeId,
        check_out: DateTime<Utc>,
    ) -> Result<SessionId, Self::Error>;

    fn close_session(&mut self, id: SessionId, check_out: DateTime<Utc>)
    -> Result<(), Self::Error>;

    fn abandon_session(&mut self, id: SessionId) -> Result<(), Self::Error>;

    fn mark_processed(&mut self, punch: PunchId, session: SessionId) -> Result<(), Self::Error>;
}

/// A staged punch that is ready to be reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPunch {
    pub id: PunchId,
    pub employee: EmployeeId,
    pub at: DateTime<Utc>,
}

impl PendingPunch {
    /// Returns `None` for processed punches and punches without an employee.
    pub fn from_staged(punch: &StagedPunch) -> Option<Self> {
        if punch.processed {
            return None;
        }
        Some(Self {
            id: punch.id,
            employee: punch.employee?,
            at: punch.punched_at,
        })
    }
}

/// What reconciling one punch did to the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A session already carried this instant.
    AlreadyLinked,
    Opened,
    /// A check-in while the same shift's session was still open.
    RepeatedCheckIn,
    Closed,
    /// A check-out with nothing open to close.
    OrphanCheckOut,
}

/// The result of reconciling one punch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PunchOutcome {
    pub punch: PunchId,
    pub session: SessionId,
    pub action: Action,
    /// A stale open session superseded by this check-in.
    pub abandoned: Option<SessionId>,
}

/// Reconciles a single punch against the store and marks it processed.
///
/// Callers feed punches in ascending timestamp order and should apply each
/// call atomically.
pub fn apply_punch<S: SessionStore>(
    store: &mut S,
    schedule: &Schedule,
    punch: PendingPunch,
    config: &ReconcileConfig,
) -> Result<PunchOutcome, S::Error> {
    if let Some(existing) = store.session_touching(punch.employee, punch.at)? {
        store.mark_processed(punch.id, existing.id)?;
        return Ok(PunchOutcome {
            punch: punch.id,
            session: existing.id,
            action: Action::AlreadyLinked,
            abandoned: None,
        });
    }

    let interpretation = interpret(schedule, punch.at, config);
    tracing::debug!(
        punch = %punch.id,
        employee = %punch.employee,
        at = %punch.at,
        kind = interpretation.kind.as_str(),
        rule = ?interpretation.rule,
        "interpreted punch"
    );

    let mut abandoned = None;
    let (session, action) = match interpretation.intent {
        PunchIntent::CheckIn { shift_since } => match store.latest_open(punch.employee, None)? {
            Some(open) if open.check_in.is_some_and(|check_in| check_in >= shift_since) => {
                (open.id, Action::RepeatedCheckIn)
            }
            Some(stale) => {
                tracing::info!(
                    employee = %punch.employee,
                    session = %stale.id,
                    "abandoning session left open by an earlier shift"
                );
                store.abandon_session(stale.id)?;
                abandoned = Some(stale.id);
                (store.open_session(punch.employee, punch.at)?, Action::Opened)
            }
            None => (store.open_session(punch.employee, punch.at)?, Action::Opened),
        },
        PunchIntent::CheckOut { open_since } => {
            match store.latest_open(punch.employee, open_since)? {
                Some(open) => {
                    store.close_session(open.id, punch.at)?;
                    (open.id, Action::Closed)
                }
                None => (
                    store.orphan_check_out(punch.employee, punch.at)?,
                    Action::OrphanCheckOut,
                ),
            }
        }
    };

    store.mark_processed(punch.id, session)?;
    Ok(PunchOutcome {
        punch: punch.id,
        session,
        action,
        abandoned,
    })
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Punches marked processed in this pass.
    pub processed: usize,
    pub opened: usize,
    pub closed: usize,
    pub orphaned: usize,
    pub repeated: usize,
    pub already_linked: usize,
    pub abandoned: usize,
    /// Punches left unprocessed because applying them failed.
    pub failed: usize,
}

impl ReconcileReport {
    pub const fn record(&mut self, outcome: &PunchOutcome) {
        self.processed += 1;
        match outcome.action {
            Action::AlreadyLinked => self.already_linked += 1,
            Action::Opened => self.opened += 1,
            Action::RepeatedCheckIn => self.repeated += 1,
            Action::Closed => self.closed += 1,
            Action::OrphanCheckOut => self.orphaned += 1,
        }
        if outcome.abandoned.is_some() {
            self.abandoned += 1;
        }
    }
}

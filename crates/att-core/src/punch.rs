//! Raw punches as reported by a terminal and as staged for reconciliation.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::{DeviceUserId, EmployeeId, PunchId, SessionId, TerminalName};
use crate::window::localize;

/// One attendance log entry read from a terminal.
///
/// Terminals report wall-clock time without an offset, in whatever timezone
/// the site runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePunch {
    pub user_id: DeviceUserId,
    pub timestamp: NaiveDateTime,
    /// Attendance state code reported by the terminal (check-in, break, ...).
    /// Informational only; reconciliation derives direction from calendars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// Verification method code (fingerprint, card, ...). Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punch: Option<i64>,
}

impl DevicePunch {
    /// The punch instant, with the terminal's wall clock read in `tz`.
    pub fn instant(&self, tz: Tz) -> DateTime<Utc> {
        normalize_timestamp(tz, self.timestamp)
    }
}

/// Converts a terminal wall-clock timestamp to UTC.
pub fn normalize_timestamp(tz: Tz, timestamp: NaiveDateTime) -> DateTime<Utc> {
    localize(tz, timestamp).with_timezone(&Utc)
}

/// A punch persisted by the stager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedPunch {
    pub id: PunchId,
    pub device_user_id: DeviceUserId,
    /// Which configured terminal delivered the punch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalName>,
    /// `None` while the device user is unknown to the employee directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<EmployeeId>,
    pub punched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punch: Option<i64>,
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,
}

/// Sorts punches into reconciliation order: timestamp ascending, then row id.
///
/// The session state machine is order sensitive, so callers must never
/// reconcile punches in any other order.
pub fn sort_for_reconciliation(punches: &mut [StagedPunch]) {
    punches.sort_by(|a, b| a.punched_at.cmp(&b.punched_at).then(a.id.cmp(&b.id)));
}

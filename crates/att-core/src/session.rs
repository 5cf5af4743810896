//! Attendance sessions - one employee work period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EmployeeId, SessionId};

/// A check-in/check-out pair for one employee.
///
/// Either side may be missing: a session without check-out is open (or was
/// abandoned), a session without check-in is an orphan check-out. A session
/// with neither is never created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub id: SessionId,
    pub employee: EmployeeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<DateTime<Utc>>,
    /// Set when a later check-in superseded this session before it was
    /// closed. Abandoned sessions never receive a check-out.
    #[serde(default)]
    pub abandoned: bool,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Closed,
    OrphanCheckOut,
    Abandoned,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::OrphanCheckOut => "orphan_check_out",
            Self::Abandoned => "abandoned",
        }
    }
}

impl AttendanceSession {
    pub const fn state(&self) -> SessionState {
        match (self.check_in.is_some(), self.check_out.is_some()) {
            (false, true) => SessionState::OrphanCheckOut,
            (true, true) => SessionState::Closed,
            _ if self.abandoned => SessionState::Abandoned,
            _ => SessionState::Open,
        }
    }

    /// Returns `true` while the session waits for its check-out.
    pub const fn is_open(&self) -> bool {
        matches!(self.state(), SessionState::Open)
    }

    /// Returns `true` if either side of the session equals `instant`.
    pub fn touches(&self, instant: DateTime<Utc>) -> bool {
        self.check_in == Some(instant) || self.check_out == Some(instant)
    }
}

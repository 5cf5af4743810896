//! Core domain logic for biometric punch reconciliation.
//!
//! This crate contains the fundamental types and logic for:
//! - Calendars: resolving an employee's work slots for a date
//! - Shifts: day/night classification and night-shift windows
//! - Reconciliation: mapping staged punches onto attendance sessions

pub mod calendar;
pub mod punch;
pub mod reconcile;
pub mod session;
pub mod shift;
pub mod types;
pub mod window;

pub use calendar::{CalendarSlot, Schedule};
pub use punch::{DevicePunch, StagedPunch, normalize_timestamp, sort_for_reconciliation};
pub use reconcile::{
    Action, Interpretation, PendingPunch, PunchIntent, PunchOutcome, ReconcileConfig,
    ReconcileReport, Rule, SessionStore, apply_punch, interpret,
};
pub use session::{AttendanceSession, SessionState};
pub use shift::{Shift, ShiftKind, classify};
pub use types::{DeviceUserId, EmployeeId, PunchId, SessionId, TerminalName, ValidationError};
pub use window::{ShiftWindow, localize, night_window, shift_window};

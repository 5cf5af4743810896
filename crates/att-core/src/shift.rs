//! Day/night shift classification.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarSlot, Schedule};

/// Start of the conservative overnight window used without calendar slots.
pub const FALLBACK_START: NaiveTime = match NaiveTime::from_hms_opt(16, 45, 0) {
    Some(time) => time,
    None => panic!("invalid fallback start"),
};

/// End (next day) of the conservative overnight window.
pub const FALLBACK_END: NaiveTime = match NaiveTime::from_hms_opt(8, 45, 0) {
    Some(time) => time,
    None => panic!("invalid fallback end"),
};

/// Whether a shift stays within one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftKind {
    Day,
    Night,
}

impl ShiftKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
        }
    }
}

/// The classification of a punch together with the slots it was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub kind: ShiftKind,
    /// Slots of the punch's calendar date ordered by start, or the single
    /// fallback slot when none are configured.
    pub slots: Vec<CalendarSlot>,
    /// `true` when no calendar slot applied and the fallback window was used.
    pub fallback: bool,
}

/// Classifies the shift a punch belongs to.
///
/// Only the slots of the punch's own calendar date are consulted. A night
/// punch shortly after midnight still resolves to `Night` as long as that
/// day's calendar carries the overnight slot.
pub fn classify(schedule: &Schedule, punch: NaiveDateTime) -> Shift {
    let slots = schedule.slots_on(punch.date());
    let Some(first) = slots.first() else {
        return Shift {
            kind: ShiftKind::Night,
            slots: vec![fallback_slot(punch.date().weekday())],
            fallback: true,
        };
    };

    let kind = if first.crosses_midnight() {
        ShiftKind::Night
    } else {
        ShiftKind::Day
    };
    Shift {
        kind,
        slots,
        fallback: false,
    }
}

fn fallback_slot(weekday: Weekday) -> CalendarSlot {
    CalendarSlot::new(weekday, FALLBACK_START, FALLBACK_END)
}

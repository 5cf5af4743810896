//! Work calendars and per-date slot resolution.
//!
//! An employee may be assigned any number of calendars. Their slots are
//! flattened into a single [`Schedule`] when loaded, so resolution never has
//! to distinguish between one calendar and many.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// One recurring work interval on a given weekday.
///
/// Times are local wall-clock times without a date. A slot whose end is
/// earlier than its start crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSlot {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl CalendarSlot {
    pub const fn new(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            weekday,
            start,
            end,
        }
    }

    /// Builds a slot from the stored representation: weekday index
    /// (0 = Monday) and fractional hours (`8.5` = 08:30).
    pub fn from_float_hours(
        weekday: i64,
        hour_from: f64,
        hour_to: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            weekday: weekday_from_index(weekday)?,
            start: float_hour_to_time(hour_from)?,
            end: float_hour_to_time(hour_to)?,
        })
    }

    /// Whether this slot ends on the following calendar day.
    pub fn crosses_midnight(&self) -> bool {
        self.end < self.start
    }
}

/// Converts fractional hours into a time of day.
///
/// Minutes are rounded to the nearest whole minute; a rounding overflow to
/// 60 minutes carries into the hour, and hours wrap at 24 (so `24.0` is
/// midnight).
pub fn float_hour_to_time(hour: f64) -> Result<NaiveTime, ValidationError> {
    if !(0.0..=24.0).contains(&hour) {
        return Err(ValidationError::HourOutOfRange { value: hour });
    }
    let total_minutes = (hour * 60.0).round();
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "range checked above, at most 1440 minutes"
    )]
    let total_minutes = total_minutes as u32;
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or(ValidationError::HourOutOfRange { value: hour })
}

/// Converts a time of day back to fractional hours.
pub fn time_to_float_hour(time: NaiveTime) -> f64 {
    f64::from(time.hour()) + f64::from(time.minute()) / 60.0
}

/// Maps a stored weekday index (0 = Monday .. 6 = Sunday) to a [`Weekday`].
pub fn weekday_from_index(index: i64) -> Result<Weekday, ValidationError> {
    let day = match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        _ => return Err(ValidationError::WeekdayOutOfRange { value: index }),
    };
    Ok(day)
}

/// All slots of every calendar assigned to one employee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    slots: Vec<CalendarSlot>,
}

impl Schedule {
    pub fn new(slots: impl IntoIterator<Item = CalendarSlot>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    /// Returns `true` if no calendar slot is assigned at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots that apply on `date`, ordered by start time.
    ///
    /// Empty when the employee has no calendar or no slot on that weekday.
    pub fn slots_on(&self, date: NaiveDate) -> Vec<CalendarSlot> {
        let weekday = date.weekday();
        let mut slots: Vec<CalendarSlot> = self
            .slots
            .iter()
            .filter(|slot| slot.weekday == weekday)
            .copied()
            .collect();
        slots.sort_by_key(|slot| (slot.start, slot.end));
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn float_hours_convert_to_wall_clock() {
        assert_eq!(float_hour_to_time(8.5).unwrap(), t(8, 30));
        assert_eq!(float_hour_to_time(16.75).unwrap(), t(16, 45));
        assert_eq!(float_hour_to_time(0.0).unwrap(), t(0, 0));
    }

    #[test]
    fn float_hours_carry_rounded_minutes() {
        // 8.9999 rounds to 540 minutes, i.e. 09:00 rather than 08:60.
        assert_eq!(float_hour_to_time(8.9999).unwrap(), t(9, 0));
    }

    #[test]
    fn float_hours_wrap_at_midnight() {
        assert_eq!(float_hour_to_time(24.0).unwrap(), t(0, 0));
    }

    #[test]
    fn float_hours_reject_out_of_range() {
        assert!(float_hour_to_time(-0.5).is_err());
        assert!(float_hour_to_time(24.5).is_err());
        assert!(float_hour_to_time(f64::NAN).is_err());
    }

    #[test]
    fn time_to_float_hour_inverts_conversion() {
        assert!((time_to_float_hour(t(20, 45)) - 20.75).abs() < f64::EPSILON);
    }

    #[test]
    fn weekday_index_starts_on_monday() {
        assert_eq!(weekday_from_index(0).unwrap(), Weekday::Mon);
        assert_eq!(weekday_from_index(6).unwrap(), Weekday::Sun);
        assert!(weekday_from_index(7).is_err());
    }

    #[test]
    fn slot_crossing_midnight() {
        let night = CalendarSlot::from_float_hours(0, 20.75, 5.0).unwrap();
        assert!(night.crosses_midnight());
        let day = CalendarSlot::from_float_hours(0, 9.0, 13.0).unwrap();
        assert!(!day.crosses_midnight());
    }

    #[test]
    fn slots_on_merges_calendars_and_sorts_by_start() {
        // 2025-03-03 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let schedule = Schedule::new([
            CalendarSlot::new(Weekday::Mon, t(14, 0), t(18, 0)),
            CalendarSlot::new(Weekday::Tue, t(7, 0), t(11, 0)),
            CalendarSlot::new(Weekday::Mon, t(9, 0), t(13, 0)),
        ]);

        let slots = schedule.slots_on(monday);
        assert_eq!(
            slots,
            vec![
                CalendarSlot::new(Weekday::Mon, t(9, 0), t(13, 0)),
                CalendarSlot::new(Weekday::Mon, t(14, 0), t(18, 0)),
            ]
        );
    }

    #[test]
    fn slots_on_is_empty_without_matching_weekday() {
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let schedule = Schedule::new([CalendarSlot::new(Weekday::Mon, t(9, 0), t(13, 0))]);
        assert!(schedule.slots_on(sunday).is_empty());
        assert!(Schedule::default().slots_on(sunday).is_empty());
    }
}

//! Shift windows anchored on real calendar days.
//!
//! A night shift spans two calendar days. Each boundary is taken from the
//! calendar of the day it belongs to: the start from the first day's latest
//! slot start, the end from the second day's earliest slot end. Per-day
//! overrides (holiday calendars and the like) therefore apply to each end of
//! the window independently.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::calendar::{CalendarSlot, Schedule};
use crate::shift::{FALLBACK_END, FALLBACK_START, ShiftKind, classify};

/// The active shift around a punch. Derived per punch, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub kind: ShiftKind,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl ShiftWindow {
    /// Returns `true` if `instant` lies within `[start, end]`.
    pub fn contains<T: TimeZone>(&self, instant: &DateTime<T>) -> bool {
        *instant >= self.start && *instant <= self.end
    }
}

/// Resolves a local wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) resolve to the earliest instant. Times
/// skipped by a DST gap resolve one hour later.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

fn at(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    localize(tz, date.and_time(time))
}

fn latest_start(slots: &[CalendarSlot]) -> Option<NaiveTime> {
    slots.iter().map(|slot| slot.start).max()
}

fn earliest_end(slots: &[CalendarSlot]) -> Option<NaiveTime> {
    slots.iter().map(|slot| slot.end).min()
}

/// Computes the two-day window of the night shift a punch belongs to.
///
/// A punch at or before today's earliest slot end sits on the morning side
/// of a shift that began the previous day; anything later sits on the
/// evening side of a shift ending the next day.
pub fn night_window(schedule: &Schedule, punch: DateTime<Tz>) -> ShiftWindow {
    let tz = punch.timezone();
    let local = punch.naive_local();
    let today = local.date();
    let time = local.time();
    let slots_today = schedule.slots_on(today);

    if slots_today.is_empty() {
        let (start_date, end_date) = if time <= FALLBACK_END {
            (today.pred_opt().unwrap_or(today), today)
        } else {
            (today, today.succ_opt().unwrap_or(today))
        };
        return ShiftWindow {
            kind: ShiftKind::Night,
            start: at(tz, start_date, FALLBACK_START),
            end: at(tz, end_date, FALLBACK_END),
        };
    }

    let first_start_today = latest_start(&slots_today).unwrap_or(FALLBACK_START);
    let second_end_today = earliest_end(&slots_today).unwrap_or(FALLBACK_END);

    let (start, end) = if time <= second_end_today {
        let prev = today.pred_opt().unwrap_or(today);
        let first_start_prev =
            latest_start(&schedule.slots_on(prev)).unwrap_or(first_start_today);
        (at(tz, prev, first_start_prev), at(tz, today, second_end_today))
    } else {
        let next = today.succ_opt().unwrap_or(today);
        let second_end_next = earliest_end(&schedule.slots_on(next)).unwrap_or(second_end_today);
        (at(tz, today, first_start_today), at(tz, next, second_end_next))
    };

    ShiftWindow {
        kind: ShiftKind::Night,
        start,
        end,
    }
}

/// Computes the window of whichever shift a punch belongs to.
///
/// Day shifts span the punch date from the first slot start to the last
/// slot end.
pub fn shift_window(schedule: &Schedule, punch: DateTime<Tz>) -> ShiftWindow {
    let tz = punch.timezone();
    let date = punch.naive_local().date();
    let shift = classify(schedule, punch.naive_local());
    match shift.kind {
        ShiftKind::Night => night_window(schedule, punch),
        ShiftKind::Day => {
            let start = shift.slots.iter().map(|slot| slot.start).min();
            let end = shift.slots.iter().map(|slot| slot.end).max();
            ShiftWindow {
                kind: ShiftKind::Day,
                start: at(tz, date, start.unwrap_or(NaiveTime::MIN)),
                end: at(tz, date, end.unwrap_or(NaiveTime::MIN)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn local(tz: Tz, day: u32, h: u32, m: u32) -> DateTime<Tz> {
        localize(tz, d(day).and_time(t(h, m)))
    }

    fn every_day(start: NaiveTime, end: NaiveTime) -> Schedule {
        Schedule::new(
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ]
            .into_iter()
            .map(|day| CalendarSlot::new(day, start, end)),
        )
    }

    #[test]
    fn evening_punch_window_ends_next_day() {
        let tz = Tz::UTC;
        let schedule = every_day(t(20, 45), t(5, 0));
        let window = night_window(&schedule, local(tz, 3, 21, 0));
        assert_eq!(window.start, local(tz, 3, 20, 45));
        assert_eq!(window.end, local(tz, 4, 5, 0));
    }

    #[test]
    fn morning_punch_window_started_previous_day() {
        let tz = Tz::UTC;
        let schedule = every_day(t(20, 45), t(5, 0));
        let window = night_window(&schedule, local(tz, 4, 4, 30));
        assert_eq!(window.start, local(tz, 3, 20, 45));
        assert_eq!(window.end, local(tz, 4, 5, 0));
    }

    #[test]
    fn both_sides_of_midnight_share_one_window() {
        let tz = Tz::Asia__Yangon;
        let schedule = every_day(t(20, 45), t(5, 0));
        let evening = night_window(&schedule, local(tz, 3, 21, 0));
        let morning = night_window(&schedule, local(tz, 4, 4, 30));
        assert_eq!(evening, morning);
    }

    #[test]
    fn each_boundary_uses_its_own_day() {
        let tz = Tz::UTC;
        // Monday 3rd starts late, Tuesday 4th ends early.
        let schedule = Schedule::new([
            CalendarSlot::new(Weekday::Mon, t(22, 0), t(6, 0)),
            CalendarSlot::new(Weekday::Tue, t(20, 0), t(4, 0)),
        ]);

        let evening = night_window(&schedule, local(tz, 3, 22, 30));
        assert_eq!(evening.start, local(tz, 3, 22, 0));
        assert_eq!(evening.end, local(tz, 4, 4, 0));

        let morning = night_window(&schedule, local(tz, 4, 3, 30));
        assert_eq!(morning.start, local(tz, 3, 22, 0));
        assert_eq!(morning.end, local(tz, 4, 4, 0));
    }

    #[test]
    fn missing_adjacent_day_reuses_today() {
        let tz = Tz::UTC;
        let schedule = Schedule::new([CalendarSlot::new(Weekday::Mon, t(20, 45), t(5, 0))]);

        let evening = night_window(&schedule, local(tz, 3, 21, 0));
        assert_eq!(evening.end, local(tz, 4, 5, 0));

        let morning = night_window(&schedule, local(tz, 3, 4, 0));
        assert_eq!(morning.start, local(tz, 2, 20, 45));
    }

    #[test]
    fn no_calendar_uses_fallback_window() {
        let tz = Tz::UTC;
        let schedule = Schedule::default();

        let evening = night_window(&schedule, local(tz, 3, 17, 0));
        assert_eq!(evening.start, local(tz, 3, 16, 45));
        assert_eq!(evening.end, local(tz, 4, 8, 45));

        let morning = night_window(&schedule, local(tz, 4, 8, 45));
        assert_eq!(morning.start, local(tz, 3, 16, 45));
        assert_eq!(morning.end, local(tz, 4, 8, 45));
    }

    #[test]
    fn day_shift_window_spans_slots() {
        let tz = Tz::UTC;
        let schedule = Schedule::new([
            CalendarSlot::new(Weekday::Mon, t(9, 0), t(13, 0)),
            CalendarSlot::new(Weekday::Mon, t(14, 0), t(18, 0)),
        ]);
        let window = shift_window(&schedule, local(tz, 3, 10, 0));
        assert_eq!(window.kind, ShiftKind::Day);
        assert_eq!(window.start, local(tz, 3, 9, 0));
        assert_eq!(window.end, local(tz, 3, 18, 0));
        assert!(window.contains(&local(tz, 3, 17, 59)));
        assert!(!window.contains(&local(tz, 3, 18, 1)));
    }

    #[test]
    fn localize_handles_dst_gap_and_overlap() {
        let tz = Tz::Europe__Berlin;
        // 2025-03-30 02:30 does not exist in Berlin.
        let gap = NaiveDate::from_ymd_opt(2025, 3, 30)
            .unwrap()
            .and_time(t(2, 30));
        assert_eq!(localize(tz, gap).naive_local(), gap + Duration::hours(1));

        // 2025-10-26 02:30 happens twice; the first one is CEST (+02:00).
        let overlap = NaiveDate::from_ymd_opt(2025, 10, 26)
            .unwrap()
            .and_time(t(2, 30));
        let resolved = localize(tz, overlap);
        assert_eq!(resolved.naive_utc(), overlap - Duration::hours(2));
    }
}

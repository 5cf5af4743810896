//! Fixtures shared by command tests.

use att_core::{CalendarSlot, DevicePunch, DeviceUserId, TerminalName};
use att_db::{CalendarDefinition, Database, EmployeeDefinition};
use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;

const WORKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Office calendar (09-13, 14-18), night calendar (20:45-05:00) and three
/// employees: 100 on office hours, 200 on nights, 300 without a calendar.
pub fn directory_fixture(db: &mut Database) {
    let office = CalendarDefinition {
        name: "office".to_string(),
        slots: WORKDAYS
            .iter()
            .flat_map(|day| {
                [
                    CalendarSlot::new(*day, t(9, 0), t(13, 0)),
                    CalendarSlot::new(*day, t(14, 0), t(18, 0)),
                ]
            })
            .collect(),
    };
    let night = CalendarDefinition {
        name: "night".to_string(),
        slots: WORKDAYS
            .iter()
            .map(|day| CalendarSlot::new(*day, t(20, 45), t(5, 0)))
            .collect(),
    };
    let employee = |number: &str, name: Option<&str>, calendars: &[&str]| EmployeeDefinition {
        employee_number: DeviceUserId::new(number).unwrap(),
        name: name.map(str::to_string),
        calendars: calendars.iter().map(|c| (*c).to_string()).collect(),
    };
    db.load_directory(
        &[office, night],
        &[
            employee("100", Some("Aye Aye"), &["office"]),
            employee("200", Some("Ko Ko"), &["night"]),
            employee("300", None, &[]),
        ],
    )
    .unwrap();
}

pub fn punch(user: &str, day: u32, h: u32, m: u32) -> DevicePunch {
    DevicePunch {
        user_id: DeviceUserId::new(user).unwrap(),
        timestamp: NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_time(t(h, m)),
        status: Some(0),
        punch: Some(1),
    }
}

/// Monday 2025-03-03 on terminal "gate", UTC wall clock.
pub fn stage_fixture(db: &mut Database) {
    let gate = TerminalName::new("gate").unwrap();
    db.stage_punches(
        Some(&gate),
        &[
            punch("100", 3, 9, 5),
            punch("100", 3, 18, 10),
            punch("200", 3, 21, 0),
            punch("300", 3, 12, 0),
            punch("999", 3, 9, 0),
        ],
        Tz::UTC,
    )
    .unwrap();
}

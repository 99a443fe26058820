//! iCalendar export of a schedule.
//!
//! Each day gets a summary entry spanning the study day, with a reminder the
//! evening before listing the day's classes. Each class gets its own entry
//! with a reminder shortly before it starts.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use icalendar::{Alarm, Calendar, Component, EventLike, Property, Trigger};

use crate::event::{Event, ONLINE_ADDRESS};
use crate::event_set::EventSet;

const PRODID: &str = "PRODID:-//modsync//schedule//RU";

const DAY_START: (u32, u32) = (8, 20);
const DAY_END: (u32, u32) = (21, 0);

/// Minutes before a class its reminder fires.
pub const CLASS_REMINDER_MINUTES: i64 = 15;

const MONTHS: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня", "июля", "августа", "сентября",
    "октября", "ноября", "декабря",
];
const WEEKDAYS: [&str; 7] = [
    "понедельник", "вторник", "среда", "четверг", "пятница", "суббота", "воскресенье",
];

/// "вторник, 2 июля"
pub fn russian_date(date: NaiveDate) -> String {
    let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS[date.month0() as usize];
    format!("{}, {} {}", weekday, date.day(), month)
}

/// Render `events` as an iCalendar document.
pub fn export(events: &EventSet) -> String {
    let mut cal = Calendar::new();

    for date in events.dates() {
        let day = events.on_date(date);
        cal.push(day_entry(date, &day));
        for event in &day {
            cal.push(class_entry(event));
        }
    }

    let cal = cal.done();
    normalize(&cal.to_string())
}

fn day_entry(date: NaiveDate, day: &EventSet) -> icalendar::Event {
    let listing = day
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let mut entry = icalendar::Event::new();
    entry.uid(&format!("{date}-day"));
    entry.summary(&format!("Расписание на {}", russian_date(date)));
    entry.description(&listing);
    add_local_time(&mut entry, "DTSTART", date.and_time(hm(DAY_START)));
    add_local_time(&mut entry, "DTEND", date.and_time(hm(DAY_END)));

    // 18:00 the evening before
    let before = Duration::hours(14) + Duration::minutes(20);
    entry.alarm(Alarm::display(
        &format!("Расписание на завтра:\n{listing}"),
        Trigger::before_start(before),
    ));

    entry.done()
}

fn class_entry(event: &Event) -> icalendar::Event {
    let summary = if event.format_label.is_empty() {
        event.title.clone()
    } else {
        format!("{}, {}", event.format_label, event.title)
    };

    let mut entry = icalendar::Event::new();
    entry.uid(&event.id);
    entry.summary(&summary);
    add_local_time(&mut entry, "DTSTART", event.date.and_time(event.start_time));
    add_local_time(&mut entry, "DTEND", event.date.and_time(event.end_time));
    if let Some(location) = location(event) {
        entry.location(&location);
    }
    entry.description(&format!("Преподаватель: {}.", event.instructor));
    if !event.status.is_empty() {
        entry.add_property("X-MODSYNC-STATUS", &event.status);
    }

    entry.alarm(Alarm::display(
        "Скоро начнется пара! Подготовьтесь!",
        Trigger::before_start(Duration::minutes(CLASS_REMINDER_MINUTES)),
    ));

    entry.done()
}

fn location(event: &Event) -> Option<String> {
    match (&event.room_name, &event.location_address) {
        (Some(room), Some(address)) if address == ONLINE_ADDRESS => Some(format!("Online: {room}")),
        (Some(room), Some(address)) => Some(format!("{room}, {address}")),
        (Some(room), None) => Some(room.clone()),
        (None, _) => None,
    }
}

fn hm((hour, minute): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Wall-clock time in the schedule timezone.
fn add_local_time(entry: &mut icalendar::Event, name: &str, at: NaiveDateTime) {
    let mut prop = Property::new(name, at.format("%Y%m%dT%H%M%S").to_string());
    prop.add_parameter("TZID", "Europe/Moscow");
    entry.append_property(prop);
}

/// Own PRODID, no default CALSCALE, no DTSTAMP/UID inside alarms.
fn normalize(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_alarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str(PRODID);
            result.push_str("\r\n");
            continue;
        }
        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_alarm = true;
        } else if line == "END:VALARM" {
            in_alarm = false;
        }
        if in_alarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn class(id: &str, day: u32, hour: u32, minute: u32) -> Event {
        let mut e = Event::new(
            id,
            date(day),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            NaiveTime::from_hms_opt(hour + 1, 35, 0).unwrap(),
            "Алгебра",
        );
        e.format_label = "Лекция".into();
        e.instructor = "Иванов И. И.".into();
        e.room_name = Some("Г-1401".into());
        e.location_address = Some("наб. Северной Двины, 17".into());
        e
    }

    #[test]
    fn test_russian_date() {
        assert_eq!(russian_date(date(2)), "вторник, 2 июля");
    }

    #[test]
    fn test_export_has_day_and_class_entries() {
        let events = EventSet::new(vec![class("a", 2, 8, 20), class("b", 2, 10, 10), class("c", 3, 8, 20)]);
        let ics = export(&events);

        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 5);
        assert!(ics.contains("UID:2024-07-02-day"));
        assert!(ics.contains("UID:2024-07-03-day"));
        assert!(ics.contains("UID:a\r\n"));
        assert!(ics.contains("DTSTART;TZID=Europe/Moscow:20240702T082000"));
        assert!(ics.contains(PRODID));
        assert!(!ics.contains("CALSCALE"));
    }

    #[test]
    fn test_class_entry_fields() {
        let ics = export(&EventSet::new(vec![class("a", 2, 8, 20)]));

        assert!(ics.contains("SUMMARY:Лекция"));
        assert!(ics.contains("Преподаватель: Иванов И. И."));
        assert!(ics.contains("TRIGGER"));
        assert!(ics.contains("BEGIN:VALARM"));
    }

    #[test]
    fn test_online_location() {
        let mut event = class("a", 2, 8, 20);
        event.room_name = Some("Teams".into());
        event.location_address = Some(ONLINE_ADDRESS.into());
        assert_eq!(location(&event).as_deref(), Some("Online: Teams"));

        event.room_name = None;
        assert_eq!(location(&event), None);
    }

    #[test]
    fn test_empty_schedule_exports_empty_calendar() {
        let ics = export(&EventSet::empty());
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(!ics.contains("BEGIN:VEVENT"));
    }
}

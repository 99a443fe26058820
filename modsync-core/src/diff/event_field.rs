use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::event::Event;

/// A non-identity field of an [`Event`], named as it appears in cache files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventField {
    Date,
    StartTime,
    EndTime,
    Title,
    Instructor,
    RoomName,
    LocationAddress,
    Status,
    FormatLabel,
}

impl EventField {
    pub const ALL: [EventField; 9] = [
        EventField::Date,
        EventField::StartTime,
        EventField::EndTime,
        EventField::Title,
        EventField::Instructor,
        EventField::RoomName,
        EventField::LocationAddress,
        EventField::Status,
        EventField::FormatLabel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventField::Date => "date",
            EventField::StartTime => "start_time",
            EventField::EndTime => "end_time",
            EventField::Title => "name",
            EventField::Instructor => "teacher",
            EventField::RoomName => "room_name",
            EventField::LocationAddress => "address",
            EventField::Status => "status",
            EventField::FormatLabel => "format",
        }
    }

    /// Whether `new` and `old` disagree on this field.
    fn differs(&self, new: &Event, old: &Event) -> bool {
        match self {
            EventField::Date => new.date != old.date,
            EventField::StartTime => new.start_time != old.start_time,
            EventField::EndTime => new.end_time != old.end_time,
            EventField::Title => new.title != old.title,
            EventField::Instructor => new.instructor != old.instructor,
            EventField::RoomName => new.room_name != old.room_name,
            EventField::LocationAddress => new.location_address != old.location_address,
            EventField::Status => new.status != old.status,
            EventField::FormatLabel => new.format_label != old.format_label,
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("Unknown event field '{}'", s))
    }
}

impl Event {
    /// Fields whose values differ between `self` (newer) and `old`.
    ///
    /// Identity (`id`), the derived slot number and diff markers are not
    /// compared.
    pub fn field_changes(&self, old: &Event) -> BTreeSet<EventField> {
        EventField::ALL
            .into_iter()
            .filter(|field| field.differs(self, old))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn make_event() -> Event {
        Event::new(
            "evt-1",
            NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(),
            NaiveTime::from_hms_opt(8, 20, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 55, 0).unwrap(),
            "Algebra",
        )
    }

    #[test]
    fn test_field_changes_empty_for_equal_events() {
        let event = make_event();
        assert!(event.field_changes(&event.clone()).is_empty());
    }

    #[test]
    fn test_field_changes_reports_each_changed_field() {
        let old = make_event();
        let mut new = old.clone();
        new.room_name = Some("L-101".to_string());
        new.status = "Cancelled".to_string();

        let changes = new.field_changes(&old);
        assert_eq!(
            changes.into_iter().collect::<Vec<_>>(),
            vec![EventField::RoomName, EventField::Status]
        );
    }

    #[test]
    fn test_field_names_round_trip_through_from_str() {
        for field in EventField::ALL {
            assert_eq!(field.as_str().parse::<EventField>(), Ok(field));
        }
        assert!("sequence".parse::<EventField>().is_err());
    }
}

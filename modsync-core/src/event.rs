//! Schedule event type.
//!
//! An event is identified by its remote id only: two `Event`s with the same
//! id are the same class, whatever their other fields say. That is what lets
//! the diff engine match snapshots and report field-level changes.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{localize, slot_number};
use crate::diff::{DiffKind, EventField};

/// One class/session instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "EventRecord", into = "EventRecord")]
pub struct Event {
    pub id: String,
    /// 1-based class slot within the day, -1 when the start time is off-grid.
    pub sequence_number: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: String,
    pub instructor: String,
    /// `None` for events without a room (usually online).
    pub room_name: Option<String>,
    pub location_address: Option<String>,
    pub status: String,
    /// Event type and format, e.g. "Лекция, Очная". May be empty.
    pub format_label: String,
    pub diff_kind: DiffKind,
    /// Only populated when `diff_kind` is `Modified`.
    pub changed_fields: BTreeSet<EventField>,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        title: impl Into<String>,
    ) -> Self {
        Event {
            id: id.into(),
            sequence_number: slot_number(start_time),
            date,
            start_time,
            end_time,
            title: title.into(),
            instructor: String::new(),
            room_name: None,
            location_address: None,
            status: String::new(),
            format_label: String::new(),
            diff_kind: DiffKind::None,
            changed_fields: BTreeSet::new(),
        }
    }

    pub fn start_at(&self) -> DateTime<Tz> {
        localize(self.date, self.start_time)
    }

    pub fn end_at(&self) -> DateTime<Tz> {
        localize(self.date, self.end_time)
    }

    /// Whether `at` falls within `[start, end]` (both inclusive).
    pub fn contains(&self, at: DateTime<Tz>) -> bool {
        self.start_at() <= at && at <= self.end_at()
    }

    pub fn is_online(&self) -> bool {
        self.room_name.is_none() || self.location_address.as_deref() == Some(ONLINE_ADDRESS)
    }

    /// Mark as added or removed.
    pub fn marked(mut self, kind: DiffKind) -> Self {
        self.diff_kind = kind;
        self.changed_fields.clear();
        self
    }

    pub fn marked_modified(mut self, fields: BTreeSet<EventField>) -> Self {
        self.diff_kind = DiffKind::Modified;
        self.changed_fields = fields;
        self
    }

    /// Drop any diff marker (cache files store plain events).
    pub fn unmarked(self) -> Self {
        self.marked(DiffKind::None)
    }

    /// One-line description of this event as a change, e.g.
    /// `~ #2 10:10-11:45 Algebra ... (room_name, status)`.
    pub fn describe_change(&self) -> String {
        match self.diff_kind {
            DiffKind::Modified => {
                let fields: Vec<_> = self.changed_fields.iter().map(|f| f.as_str()).collect();
                format!("{} {} ({})", self.diff_kind, self, fields.join(", "))
            }
            _ => format!("{} {}", self.diff_kind, self),
        }
    }
}

/// Address the remote uses for custom (online) locations.
pub const ONLINE_ADDRESS: &str = "online";

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sequence_number > 0 {
            write!(f, "#{} ", self.sequence_number)?;
        }
        write!(
            f,
            "{}-{} ",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )?;
        if !self.format_label.is_empty() {
            write!(f, "{}, ", self.format_label)?;
        }
        write!(f, "{}", self.title)?;
        if !self.instructor.is_empty() {
            write!(f, ". {}", self.instructor)?;
        }
        match (&self.room_name, &self.location_address) {
            (Some(room), Some(addr)) if addr == ONLINE_ADDRESS => write!(f, ". Online: {}", room),
            (Some(room), Some(addr)) => write!(f, ". Room {}, {}", room, addr),
            (Some(room), None) => write!(f, ". Room {}", room),
            (None, _) => write!(f, ". Online"),
        }
    }
}

/// On-disk shape of an event inside a month partition.
///
/// The diff marker is a single string: `""` (none), `"+"`, `"-"`, or the
/// space-separated list of changed field names.
#[derive(Serialize, Deserialize)]
struct EventRecord {
    id: String,
    event: i32,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    name: String,
    teacher: String,
    room_name: Option<String>,
    address: Option<String>,
    status: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    diff: String,
}

impl From<EventRecord> for Event {
    fn from(record: EventRecord) -> Self {
        let (diff_kind, changed_fields) = match record.diff.trim() {
            "" => (DiffKind::None, BTreeSet::new()),
            "+" => (DiffKind::Added, BTreeSet::new()),
            "-" => (DiffKind::Removed, BTreeSet::new()),
            fields => (
                DiffKind::Modified,
                fields
                    .split_whitespace()
                    .filter_map(|f| f.parse().ok())
                    .collect(),
            ),
        };

        Event {
            id: record.id,
            sequence_number: record.event,
            date: record.date,
            start_time: record.start_time,
            end_time: record.end_time,
            title: record.name,
            instructor: record.teacher,
            room_name: record.room_name,
            location_address: record.address,
            status: record.status,
            format_label: record.format,
            diff_kind,
            changed_fields,
        }
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        let diff = match event.diff_kind {
            DiffKind::None => String::new(),
            DiffKind::Added => "+".to_string(),
            DiffKind::Removed => "-".to_string(),
            DiffKind::Modified => event
                .changed_fields
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        };

        EventRecord {
            id: event.id,
            event: event.sequence_number,
            date: event.date,
            start_time: event.start_time,
            end_time: event.end_time,
            name: event.title,
            teacher: event.instructor,
            room_name: event.room_name,
            address: event.location_address,
            status: event.status,
            format: event.format_label,
            diff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event() -> Event {
        let mut event = Event::new(
            "evt-1",
            NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(),
            NaiveTime::from_hms_opt(10, 10, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 45, 0).unwrap(),
            "Algebra",
        );
        event.instructor = "Ivanov I.I.".to_string();
        event.room_name = Some("L-101".to_string());
        event.location_address = Some("Lomonosov ave. 4".to_string());
        event.status = "Scheduled".to_string();
        event
    }

    #[test]
    fn test_new_derives_slot_number() {
        assert_eq!(make_event().sequence_number, 2);
    }

    #[test]
    fn test_equality_is_by_id_only() {
        let a = make_event();
        let mut b = make_event();
        b.title = "Geometry".to_string();
        assert_eq!(a, b);

        b.id = "evt-2".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let event = make_event();
        assert!(event.contains(event.start_at()));
        assert!(event.contains(event.end_at()));
        assert!(!event.contains(event.end_at() + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_cache_record_uses_wire_keys() {
        let json = serde_json::to_value(make_event()).unwrap();
        assert_eq!(json["id"], "evt-1");
        assert_eq!(json["event"], 2);
        assert_eq!(json["name"], "Algebra");
        assert_eq!(json["teacher"], "Ivanov I.I.");
        assert_eq!(json["address"], "Lomonosov ave. 4");
        assert_eq!(json["diff"], "");
    }

    #[test]
    fn test_modified_marker_survives_serialization() {
        let event = make_event().marked_modified(
            [EventField::RoomName, EventField::Status].into_iter().collect(),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"diff\":\"room_name status\""), "{}", json);

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.diff_kind, DiffKind::Modified);
        assert_eq!(parsed.changed_fields, event.changed_fields);
    }

    #[test]
    fn test_old_cache_without_format_still_parses() {
        let json = r#"{"id":"x","event":1,"date":"2024-07-02","start_time":"08:20:00",
            "end_time":"09:55:00","name":"N","teacher":"T","room_name":null,
            "address":null,"status":"S","diff":"-"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.format_label, "");
        assert_eq!(event.diff_kind, DiffKind::Removed);
        assert!(event.is_online());
    }

    #[test]
    fn test_display_mentions_room_or_online() {
        let event = make_event();
        let text = event.to_string();
        assert!(text.starts_with("#2 10:10-11:45 Algebra"), "{}", text);
        assert!(text.contains("Room L-101"), "{}", text);

        let mut online = make_event();
        online.room_name = None;
        assert!(online.to_string().ends_with("Online"));
    }
}

//! Decoding of portal responses.
//!
//! Schedule and person searches answer with a HAL-style envelope: the
//! records live under `_embedded`, grouped by kind, and refer to each other
//! through `_links.<rel>.href` values of the form `/<id>`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::constants::TIMEZONE;
use crate::error::{SyncError, SyncResult};
use crate::event::{Event, ONLINE_ADDRESS};
use crate::event_set::EventSet;
use crate::person::{Person, PersonSet, Role};

/// Instructor name used when the organizer cannot be resolved.
pub const UNKNOWN_INSTRUCTOR: &str = "Неизвестный";

const CITY_PREFIX: &str = "обл. Архангельская, г. Архангельск, ";

type Links = HashMap<String, Value>;

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(rename = "_embedded")]
    embedded: Option<T>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
struct ScheduleEmbedded {
    events: Vec<RawEvent>,
    course_unit_realizations: Vec<RawNamed>,
    event_organizers: Vec<RawEventLink>,
    event_attendees: Vec<RawLinked>,
    persons: Vec<RawPerson>,
    event_locations: Vec<RawLocation>,
    event_rooms: Vec<RawLinked>,
    rooms: Vec<RawRoom>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_short: String,
    start: String,
    end: String,
    #[serde(default)]
    type_id: Option<String>,
    #[serde(default)]
    format_id: Option<String>,
    #[serde(default)]
    holding_status: Option<RawNamedStatus>,
    #[serde(rename = "_links", default)]
    links: Links,
}

#[derive(Deserialize)]
struct RawNamedStatus {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct RawNamed {
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEventLink {
    event_id: String,
    #[serde(rename = "_links", default)]
    links: Links,
}

#[derive(Deserialize)]
struct RawLinked {
    id: String,
    #[serde(rename = "_links", default)]
    links: Links,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPerson {
    id: String,
    full_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    event_id: String,
    #[serde(default)]
    custom_location: Option<String>,
    #[serde(rename = "_links", default)]
    links: Links,
}

#[derive(Deserialize)]
struct RawRoom {
    id: String,
    name: String,
    #[serde(default)]
    building: Option<RawBuilding>,
}

#[derive(Deserialize)]
struct RawBuilding {
    #[serde(default)]
    address: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PeopleEmbedded {
    persons: Vec<RawPerson>,
    students: Vec<RawStudent>,
    employees: Vec<RawEmployee>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStudent {
    person_id: String,
    #[serde(default)]
    specialty_name: Option<String>,
    #[serde(default)]
    specialty_profile: Option<String>,
    #[serde(default)]
    learning_start_date: Option<String>,
    #[serde(default)]
    learning_end_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEmployee {
    person_id: String,
    #[serde(default)]
    group_name: Option<String>,
    #[serde(default)]
    date_in: Option<String>,
    #[serde(default)]
    date_out: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttendee {
    role_id: String,
    person_id: String,
    full_name: String,
    #[serde(default)]
    specialty_name: Option<String>,
    #[serde(default)]
    specialty_profile: Option<String>,
}

/// Open the `_embedded` envelope. Its absence means the portal changed shape.
fn embedded<T: DeserializeOwned>(body: Value) -> SyncResult<T> {
    let envelope: Envelope<T> = serde_json::from_value(body).map_err(|e| {
        warn!(error = %e, "Malformed envelope");
        SyncError::RemoteFormat(e.to_string())
    })?;

    envelope.embedded.ok_or_else(|| {
        warn!("Response has no _embedded key");
        SyncError::RemoteFormat("missing _embedded key".into())
    })
}

/// The id a `_links.<rel>.href` points at. Multi-valued or absent links
/// give `None`.
fn link_id<'a>(links: &'a Links, rel: &str) -> Option<&'a str> {
    let href = links.get(rel)?.get("href")?.as_str()?;
    Some(href.strip_prefix('/').unwrap_or(href))
}

/// Parse a schedule search response.
pub fn parse_events(body: Value) -> SyncResult<EventSet> {
    let data: ScheduleEmbedded = embedded(body)?;

    let mut events = Vec::with_capacity(data.events.len());
    for raw in &data.events {
        let start = parse_timestamp(&raw.start)?;
        let end = parse_timestamp(&raw.end)?;

        let title = link_id(&raw.links, "course-unit-realization")
            .and_then(|id| data.course_unit_realizations.iter().find(|c| c.id == id))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| join_non_empty([raw.name.as_str(), raw.name_short.as_str()]));

        let mut event = Event::new(raw.id.clone(), start.date(), start.time(), end.time(), title);
        event.instructor = resolve_instructor(&raw.id, &data);
        (event.room_name, event.location_address) = resolve_room(&raw.id, &data);
        event.status = raw
            .holding_status
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        event.format_label = format_label(raw.type_id.as_deref(), raw.format_id.as_deref());
        events.push(event);
    }

    Ok(EventSet::new(events))
}

/// Organizer -> attendee record -> person name.
fn resolve_instructor(event_id: &str, data: &ScheduleEmbedded) -> String {
    data.event_organizers
        .iter()
        .find(|o| o.event_id == event_id)
        .and_then(|o| link_id(&o.links, "event-attendees"))
        .and_then(|attendee_id| data.event_attendees.iter().find(|a| a.id == attendee_id))
        .and_then(|a| link_id(&a.links, "person"))
        .and_then(|person_id| data.persons.iter().find(|p| p.id == person_id))
        .map(|p| p.full_name.clone())
        .unwrap_or_else(|| UNKNOWN_INSTRUCTOR.to_string())
}

/// `(room, address)`. A custom location is an online event; no room link at
/// all leaves both empty.
fn resolve_room(event_id: &str, data: &ScheduleEmbedded) -> (Option<String>, Option<String>) {
    let Some(location) = data.event_locations.iter().find(|l| l.event_id == event_id) else {
        return (None, None);
    };

    if let Some(custom) = location.custom_location.as_deref().filter(|c| !c.is_empty()) {
        return (Some(custom.to_string()), Some(ONLINE_ADDRESS.to_string()));
    }

    let room = link_id(&location.links, "event-rooms")
        .and_then(|id| data.event_rooms.iter().find(|r| r.id == id))
        .and_then(|r| link_id(&r.links, "room"))
        .and_then(|id| data.rooms.iter().find(|r| r.id == id));

    match room {
        Some(room) => {
            let address = room
                .building
                .as_ref()
                .map(|b| b.address.replace(CITY_PREFIX, ""));
            (Some(room.name.clone()), address)
        }
        None => (None, None),
    }
}

/// Human-readable "type, format" label, e.g. "Лекция, Очная".
pub fn format_label(type_id: Option<&str>, format_id: Option<&str>) -> String {
    let type_name = match type_id {
        None => String::new(),
        Some(code) => code_label(code)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Неизвестный тип {code}")),
    };
    let format_name = match format_id {
        None => String::new(),
        Some(code) => code_label(code)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Неизвестный формат {code}")),
    };
    join_non_empty([type_name.as_str(), format_name.as_str()])
}

fn code_label(code: &str) -> Option<&'static str> {
    let label = match code {
        "LECT" => "Лекция",
        "SEMI" => "Практическое занятие",
        "SEMINAR" => "Семинар",
        "SEMI_OTHER" => "Практический курс",
        "LAB" => "Лабораторная работа",
        "LAB_RESEARCH" => "Лабораторный опыт",
        "MID_CHECK" => "Контрольная работа",
        "EXAMINATION" => "Экзамен",
        "PRETEST" => "Предэкзаменационная аттестация",
        "DIFF_PRETEST" => "Дифференцированный зачёт",
        "CONS" => "Консультация",
        "INFORMATION" => "вводная информация",
        _ => return None,
    };
    Some(label)
}

fn join_non_empty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wall-clock time in the schedule timezone. Offsets are converted; naive
/// timestamps are taken as already local.
fn parse_timestamp(value: &str) -> SyncResult<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&TIMEZONE).naive_local());
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|_| SyncError::RemoteFormat(format!("unparseable timestamp '{value}'")))
}

/// Leading `YYYY-MM-DD` of a date or datetime string.
fn parse_day(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?;
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parse a person search response. People without a student or employee
/// record are skipped.
pub fn parse_persons(body: Value) -> SyncResult<PersonSet> {
    let data: PeopleEmbedded = embedded(body)?;

    let people = data.persons.into_iter().filter_map(|raw| {
        if let Some(student) = data.students.iter().find(|s| s.person_id == raw.id) {
            return Some(Person {
                start_date: parse_day(student.learning_start_date.as_deref()),
                end_date: parse_day(student.learning_end_date.as_deref()),
                role: Role::Student {
                    specialty: student.specialty_name.clone().unwrap_or_default(),
                    profile: student.specialty_profile.clone().unwrap_or_default(),
                },
                id: raw.id,
                name: raw.full_name,
            });
        }

        let employee = data.employees.iter().find(|e| e.person_id == raw.id)?;
        Some(Person {
            start_date: parse_day(employee.date_in.as_deref()),
            end_date: parse_day(employee.date_out.as_deref()),
            role: Role::Employee {
                group: employee.group_name.clone().unwrap_or_default(),
            },
            id: raw.id,
            name: raw.full_name,
        })
    });

    Ok(people.collect())
}

/// Parse an attendee list. Anyone not tagged `STUDENT` is an employee with no
/// group; employees come first.
pub fn parse_attendees(body: Value) -> SyncResult<PersonSet> {
    let raw: Vec<RawAttendee> = serde_json::from_value(body).map_err(|e| {
        warn!(error = %e, "Malformed attendee list");
        SyncError::RemoteFormat(e.to_string())
    })?;

    let (students, employees): (Vec<_>, Vec<_>) =
        raw.into_iter().partition(|a| a.role_id == "STUDENT");

    let employees = employees
        .into_iter()
        .map(|a| Person::employee(a.person_id, a.full_name, ""));
    let students = students.into_iter().map(|a| {
        Person::student(
            a.person_id,
            a.full_name,
            a.specialty_name.unwrap_or_default(),
            a.specialty_profile.unwrap_or_default(),
        )
    });

    Ok(employees.chain(students).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use serde_json::json;

    fn schedule_body() -> Value {
        json!({
            "_embedded": {
                "events": [
                    {
                        "id": "ev-1",
                        "name": "Лекция 1",
                        "nameShort": "Л1",
                        "start": "2024-07-02T10:10:00+03:00",
                        "end": "2024-07-02T11:45:00+03:00",
                        "typeId": "LECT",
                        "formatId": "MID_CHECK",
                        "holdingStatus": { "name": "Запланировано" },
                        "_links": { "course-unit-realization": { "href": "/cur-1" } }
                    },
                    {
                        "id": "ev-2",
                        "name": "Вебинар",
                        "nameShort": "В",
                        "start": "2024-07-02T05:00:00Z",
                        "end": "2024-07-02T06:35:00Z",
                        "typeId": "WEIRD",
                        "holdingStatus": { "name": "Проведено" },
                        "_links": {}
                    }
                ],
                "course-unit-realizations": [ { "id": "cur-1", "name": "Алгебра" } ],
                "event-organizers": [
                    { "eventId": "ev-1", "_links": { "event-attendees": { "href": "/att-1" } } },
                    { "eventId": "ev-2", "_links": { "event-attendees": [ { "href": "/a" }, { "href": "/b" } ] } }
                ],
                "event-attendees": [ { "id": "att-1", "_links": { "person": { "href": "/p-1" } } } ],
                "persons": [ { "id": "p-1", "fullName": "Иванов Иван Иванович" } ],
                "event-locations": [
                    { "eventId": "ev-1", "_links": { "event-rooms": { "href": "/er-1" } } },
                    { "eventId": "ev-2", "customLocation": "Teams", "_links": {} }
                ],
                "event-rooms": [ { "id": "er-1", "_links": { "room": { "href": "/r-1" } } } ],
                "rooms": [
                    {
                        "id": "r-1",
                        "name": "Г-1401",
                        "building": { "address": "обл. Архангельская, г. Архангельск, наб. Северной Двины, 17" }
                    }
                ]
            }
        })
    }

    #[test]
    fn test_parse_events_resolves_links() {
        let events = parse_events(schedule_body()).unwrap();
        assert_eq!(events.len(), 2);

        let lecture = events.get("ev-1").unwrap();
        assert_eq!(lecture.title, "Алгебра");
        assert_eq!(lecture.instructor, "Иванов Иван Иванович");
        assert_eq!(lecture.room_name.as_deref(), Some("Г-1401"));
        assert_eq!(lecture.location_address.as_deref(), Some("наб. Северной Двины, 17"));
        assert_eq!(lecture.status, "Запланировано");
        assert_eq!(lecture.format_label, "Лекция, Контрольная работа");
        assert_eq!(lecture.sequence_number, 2);
        assert_eq!(lecture.start_time, NaiveTime::from_hms_opt(10, 10, 0).unwrap());
    }

    #[test]
    fn test_parse_events_fallbacks() {
        let events = parse_events(schedule_body()).unwrap();
        let webinar = events.get("ev-2").unwrap();

        // 05:00Z is 08:00 in Moscow, off the slot grid
        assert_eq!(webinar.start_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(webinar.sequence_number, -1);
        assert_eq!(webinar.title, "Вебинар, В");
        assert_eq!(webinar.instructor, UNKNOWN_INSTRUCTOR);
        assert_eq!(webinar.room_name.as_deref(), Some("Teams"));
        assert_eq!(webinar.location_address.as_deref(), Some(ONLINE_ADDRESS));
        assert_eq!(webinar.format_label, "Неизвестный тип WEIRD");
    }

    #[test]
    fn test_missing_embedded_is_remote_format_error() {
        let result = parse_events(json!({ "page": { "size": 500 } }));
        assert!(matches!(result, Err(SyncError::RemoteFormat(_))));
    }

    #[test]
    fn test_embedded_without_events_is_empty() {
        let events = parse_events(json!({ "_embedded": {} })).unwrap();
        assert!(events.is_empty());
        assert!(!events.is_cache_miss());
    }

    #[test]
    fn test_location_without_room_link() {
        let body = json!({
            "_embedded": {
                "events": [{
                    "id": "e", "start": "2024-07-02T08:20:00", "end": "2024-07-02T09:55:00",
                    "name": "X", "_links": {}
                }],
                "event-locations": [ { "eventId": "e", "_links": {} } ]
            }
        });
        let events = parse_events(body).unwrap();
        let event = events.first().unwrap();
        assert_eq!(event.room_name, None);
        assert_eq!(event.location_address, None);
        assert_eq!(event.sequence_number, 1);
    }

    #[test]
    fn test_format_label_table() {
        assert_eq!(format_label(Some("SEMI"), None), "Практическое занятие");
        assert_eq!(format_label(None, None), "");
        assert_eq!(format_label(Some("LAB"), Some("XYZ")), "Лабораторная работа, Неизвестный формат XYZ");
    }

    #[test]
    fn test_parse_persons() {
        let body = json!({
            "_embedded": {
                "persons": [
                    { "id": "s", "fullName": "Студентов Степан" },
                    { "id": "e", "fullName": "Сотрудникова Елена" },
                    { "id": "x", "fullName": "Без Записей" }
                ],
                "students": [{
                    "personId": "s", "specialtyName": "Прикладная информатика",
                    "specialtyProfile": "Разработка ПО",
                    "learningStartDate": "2021-09-01T00:00:00", "learningEndDate": null
                }],
                "employees": [{
                    "personId": "e", "groupName": "Кафедра алгебры",
                    "dateIn": "2015-02-01", "dateOut": null
                }]
            }
        });

        let people = parse_persons(body).unwrap();
        assert_eq!(people.len(), 2);

        let student = people.get("s").unwrap();
        assert_eq!(student.start_date, NaiveDate::from_ymd_opt(2021, 9, 1));
        assert_eq!(student.end_date, None);
        assert!(matches!(&student.role, Role::Student { profile, .. } if profile == "Разработка ПО"));

        let employee = people.get("e").unwrap();
        assert_eq!(employee.start_date, NaiveDate::from_ymd_opt(2015, 2, 1));
        assert_eq!(employee.role, Role::Employee { group: "Кафедра алгебры".into() });
    }

    #[test]
    fn test_parse_persons_requires_envelope() {
        assert!(matches!(parse_persons(json!([])), Err(SyncError::RemoteFormat(_))));
    }

    #[test]
    fn test_parse_attendees_puts_employees_first() {
        let body = json!([
            { "roleId": "STUDENT", "personId": "s1", "fullName": "A",
              "specialtyName": "Math", "specialtyProfile": "Stats" },
            { "roleId": "TEACH", "personId": "t1", "fullName": "T",
              "specialtyName": null, "specialtyProfile": null },
            { "roleId": "STUDENT", "personId": "s2", "fullName": "B",
              "specialtyName": "Math", "specialtyProfile": "Algebra" }
        ]);

        let people = parse_attendees(body).unwrap();
        let ids: Vec<_> = people.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "s1", "s2"]);
        assert!(people.get("t1").unwrap().is_employee());
    }

    #[test]
    fn test_parse_attendees_rejects_objects() {
        let result = parse_attendees(json!({ "error": "nope" }));
        assert!(matches!(result, Err(SyncError::RemoteFormat(_))));
    }
}

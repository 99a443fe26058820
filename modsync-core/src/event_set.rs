//! Sorted, duplicate-free collections of events.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::event::Event;

/// An ordered, duplicate-free (by id) collection of events.
///
/// `cache_miss` distinguishes "there is no partition file for this data"
/// from "the partition exists and is genuinely empty". Callers must not treat
/// the two the same way.
#[derive(Debug, Clone, Default)]
pub struct EventSet {
    events: Vec<Event>,
    cache_miss: bool,
}

impl EventSet {
    /// Build a set, keeping the first occurrence of each id and sorting by
    /// start time.
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        let mut seen = HashSet::new();
        let mut events: Vec<Event> = events
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        sort_by_start(&mut events);

        EventSet {
            events,
            cache_miss: false,
        }
    }

    /// A confirmed-empty set.
    pub fn empty() -> Self {
        EventSet::default()
    }

    /// An empty set standing in for data that was never cached.
    pub fn missing() -> Self {
        EventSet {
            events: Vec::new(),
            cache_miss: true,
        }
    }

    pub fn with_cache_miss(mut self, cache_miss: bool) -> Self {
        self.cache_miss = cache_miss;
        self
    }

    pub fn is_cache_miss(&self) -> bool {
        self.cache_miss
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    pub fn first(&self) -> Option<&Event> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Identity union with `newer`. Events in `newer` win on field values;
    /// events only in `self` are kept.
    pub fn merge(&self, newer: &EventSet) -> EventSet {
        EventSet::new(newer.events.iter().chain(self.events.iter()).cloned())
    }

    /// Events of `self` whose id also appears in `other`.
    pub fn overlap(&self, other: &EventSet) -> EventSet {
        let ids: HashSet<&str> = other.events.iter().map(|e| e.id.as_str()).collect();
        self.filtered(|e| ids.contains(e.id.as_str()))
    }

    /// Events dated within `[start, end]`, both inclusive.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> EventSet {
        self.filtered(|e| start <= e.date && e.date <= end)
    }

    /// Events dated outside `[start, end]`.
    pub fn outside(&self, start: NaiveDate, end: NaiveDate) -> EventSet {
        self.filtered(|e| e.date < start || end < e.date)
    }

    pub fn on_date(&self, date: NaiveDate) -> EventSet {
        self.filtered(|e| e.date == date)
    }

    pub fn by_number(&self, number: i32) -> EventSet {
        self.filtered(|e| e.sequence_number == number)
    }

    pub fn by_title(&self, query: &str) -> EventSet {
        let query = query.to_lowercase();
        self.filtered(|e| e.title.to_lowercase().contains(&query))
    }

    pub fn by_instructor(&self, query: &str) -> EventSet {
        let query = query.to_lowercase();
        self.filtered(|e| e.instructor.to_lowercase().contains(&query))
    }

    pub fn by_room(&self, query: &str) -> EventSet {
        let query = query.to_lowercase();
        self.filtered(|e| {
            e.room_name
                .as_deref()
                .is_some_and(|room| room.to_lowercase().contains(&query))
        })
    }

    pub fn by_status(&self, query: &str) -> EventSet {
        let query = query.to_lowercase();
        self.filtered(|e| e.status.to_lowercase().contains(&query))
    }

    /// Distinct dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.events.iter().map(|e| e.date).collect();
        dates.dedup();
        dates
    }

    /// Index by id, for identity lookups in bulk.
    pub fn by_id(&self) -> HashMap<&str, &Event> {
        self.events.iter().map(|e| (e.id.as_str(), e)).collect()
    }

    /// Keep the events matching `predicate`, preserving order and the
    /// cache-miss flag.
    fn filtered(&self, predicate: impl Fn(&Event) -> bool) -> EventSet {
        EventSet {
            events: self.events.iter().filter(|e| predicate(e)).cloned().collect(),
            cache_miss: self.cache_miss,
        }
    }
}

/// Sort by start timestamp, ties broken by id so output is deterministic.
fn sort_by_start(events: &mut [Event]) {
    events.sort_by(|a, b| a.start_at().cmp(&b.start_at()).then_with(|| a.id.cmp(&b.id)));
}

impl FromIterator<Event> for EventSet {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        EventSet::new(iter)
    }
}

impl IntoIterator for EventSet {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventSet {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn event(id: &str, day: u32, hour: u32, minute: u32) -> Event {
        Event::new(
            id,
            NaiveDate::from_ymd_opt(2024, 7, day).unwrap(),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            NaiveTime::from_hms_opt(hour + 1, minute, 0).unwrap(),
            format!("Course {}", id),
        )
    }

    #[test]
    fn test_new_sorts_by_start_and_dedups() {
        let set = EventSet::new(vec![
            event("b", 2, 10, 10),
            event("a", 2, 8, 20),
            event("b", 3, 8, 20),
            event("c", 1, 12, 0),
        ]);

        let ids: Vec<_> = set.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        // First occurrence of "b" wins
        assert_eq!(set.get("b").unwrap().date.to_string(), "2024-07-02");
    }

    #[test]
    fn test_merge_prefers_newer_fields_and_keeps_old_only_events() {
        let old = EventSet::new(vec![event("a", 2, 8, 20), event("b", 2, 10, 10)]);
        let mut changed = event("a", 2, 8, 20);
        changed.room_name = Some("L-200".to_string());
        let newer = EventSet::new(vec![changed, event("c", 3, 8, 20)]);

        let merged = old.merge(&newer);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("a").unwrap().room_name.as_deref(), Some("L-200"));
        assert!(merged.contains_id("b"));
        assert!(!merged.is_cache_miss());
    }

    #[test]
    fn test_overlap_is_identity_intersection() {
        let mine = EventSet::new(vec![event("a", 2, 8, 20), event("b", 2, 10, 10)]);
        let theirs = EventSet::new(vec![event("b", 2, 10, 10), event("c", 2, 12, 0)]);

        let shared = mine.overlap(&theirs);
        let ids: Vec<_> = shared.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_between_is_inclusive_and_keeps_cache_miss() {
        let set = EventSet::new(vec![
            event("a", 1, 8, 20),
            event("b", 2, 8, 20),
            event("c", 3, 8, 20),
        ])
        .with_cache_miss(true);

        let filtered = set.between(
            NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
        );
        assert_eq!(filtered.len(), 2);
        assert!(filtered.is_cache_miss());
    }

    #[test]
    fn test_text_queries_are_case_insensitive() {
        let mut a = event("a", 2, 8, 20);
        a.instructor = "Ivanov I.I.".to_string();
        a.room_name = Some("Lab-3".to_string());
        let set = EventSet::new(vec![a, event("b", 2, 10, 10)]);

        assert_eq!(set.by_instructor("ivanov").len(), 1);
        assert_eq!(set.by_room("LAB").len(), 1);
        assert_eq!(set.by_title("course").len(), 2);
        assert_eq!(set.by_number(2).len(), 1);
    }

    #[test]
    fn test_missing_and_empty_differ_only_by_flag() {
        assert!(EventSet::missing().is_empty());
        assert!(EventSet::missing().is_cache_miss());
        assert!(!EventSet::empty().is_cache_miss());
    }
}

//! Read-only views over a day's schedule at a given instant.
//!
//! Every instant falls into exactly one [`DayStatus`]: inside an event, in a
//! break between the day's first and last events, or outside working time.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::event::Event;
use crate::event_set::EventSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    OnEvent,
    OnBreak,
    NonWorking,
}

/// The event whose `[start, end]` contains `at`.
pub fn current_event(day: &EventSet, at: DateTime<Tz>) -> Option<&Event> {
    day.iter().find(|e| e.contains(at))
}

/// The earliest event starting strictly after `at`.
pub fn next_event(day: &EventSet, at: DateTime<Tz>) -> Option<&Event> {
    day.iter()
        .filter(|e| e.start_at() > at)
        .min_by_key(|e| e.start_at())
}

pub fn on_an_event(day: &EventSet, at: DateTime<Tz>) -> bool {
    current_event(day, at).is_some()
}

pub fn on_break(day: &EventSet, at: DateTime<Tz>) -> bool {
    day_status(day, at) == DayStatus::OnBreak
}

/// No events at all, or `at` is before the first start or after the last end.
pub fn on_non_working_time(day: &EventSet, at: DateTime<Tz>) -> bool {
    match working_span(day) {
        Some((first, last)) => at < first || last < at,
        None => true,
    }
}

pub fn day_status(day: &EventSet, at: DateTime<Tz>) -> DayStatus {
    if on_non_working_time(day, at) {
        DayStatus::NonWorking
    } else if on_an_event(day, at) {
        DayStatus::OnEvent
    } else {
        DayStatus::OnBreak
    }
}

/// Earliest start and latest end of the day.
fn working_span(day: &EventSet) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
    let first = day.iter().map(Event::start_at).min()?;
    let last = day.iter().map(Event::end_at).max()?;
    Some((first, last))
}

//! Remote schedule access.
//!
//! [`ScheduleApi`] is the raw HTTP surface of the portal (implemented in the
//! `modsync-modeus` crate). [`RemoteFetcher`] layers session handling and
//! envelope parsing on top of it and implements [`Remote`], the typed surface
//! the schedule service consumes.

pub mod envelope;
mod fetcher;

pub use fetcher::{Credentials, RemoteFetcher};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::error::SyncResult;
use crate::event_set::EventSet;
use crate::person::PersonSet;

/// Raw calls against the schedule portal. Every call takes a bearer token and
/// returns the undecoded JSON body.
#[async_trait]
pub trait ScheduleApi: Send + Sync {
    /// Events attended by `person_id` between `time_min` and `time_max`.
    async fn search_events(
        &self,
        person_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        token: &str,
    ) -> SyncResult<Value>;

    /// People whose full name (or id, with `by_id`) matches `term`.
    async fn search_persons(&self, term: &str, by_id: bool, token: &str) -> SyncResult<Value>;

    /// Role-tagged attendee records of one event.
    async fn attendees(&self, event_id: &str, token: &str) -> SyncResult<Value>;
}

/// Typed remote operations. Implementations never touch the local store.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Events of `person_id` dated within `[start, end]`.
    async fn fetch(&self, person_id: &str, start: NaiveDate, end: NaiveDate) -> SyncResult<EventSet>;

    /// Instructors first, then students.
    async fn fetch_attendees(&self, event_id: &str) -> SyncResult<PersonSet>;

    async fn search_person(&self, term: &str, by_id: bool) -> SyncResult<PersonSet>;
}

//! Schedule orchestration: cache lookup, fetch on miss, change tracking and
//! partition retention.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::constants::{OFFLINE_RETRY_SECS, TIMEZONE, today};
use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::event_set::EventSet;
use crate::person::{Person, PersonSet};
use crate::remote::Remote;
use crate::store::{MonthStore, PartitionKey};
use crate::views::{self, DayStatus};

/// First and last day of the month containing `date`.
fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    (first, last)
}

/// First day of every month touched by `[start, end]`.
fn months_touched(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut cursor = month_bounds(start).0;
    while cursor <= end {
        months.push(cursor);
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    months
}

fn now_local() -> DateTime<Tz> {
    Utc::now().with_timezone(&TIMEZONE)
}

/// Entry point for schedule reads.
///
/// One instance is meant to serve one caller at a time. A network failure
/// switches the service to offline mode: reads are served from the cache
/// (empty where nothing is cached) and no remote call is made until
/// `OFFLINE_RETRY_SECS` have passed.
pub struct ScheduleService<S: MonthStore, R: Remote> {
    store: S,
    remote: R,
    offline_since: Option<DateTime<Utc>>,
    offline_retry: Duration,
    last_changes: EventSet,
}

impl<S: MonthStore, R: Remote> ScheduleService<S, R> {
    pub fn new(store: S, remote: R) -> Self {
        ScheduleService {
            store,
            remote,
            offline_since: None,
            offline_retry: Duration::seconds(OFFLINE_RETRY_SECS),
            last_changes: EventSet::empty(),
        }
    }

    /// How long to stay offline before trying the network again.
    pub fn with_offline_retry(mut self, window: Duration) -> Self {
        self.offline_retry = window;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn is_offline(&self) -> bool {
        self.offline_since.is_some()
    }

    /// Changes picked up by the fetches of the most recent `get_schedule`.
    pub fn last_changes(&self) -> &EventSet {
        &self.last_changes
    }

    /// Events of `person` dated within `[start, end]`.
    ///
    /// With `overlap_with`, both people are fetched directly and only shared
    /// events are returned; nothing is cached. Otherwise every touched month
    /// is read from the store, and months that were never cached are fetched
    /// whole and saved.
    ///
    /// The result has `cache_miss` set when some touched month could not be
    /// fetched (offline).
    pub async fn get_schedule(
        &mut self,
        person: &Person,
        start: NaiveDate,
        end: NaiveDate,
        overlap_with: Option<&Person>,
    ) -> SyncResult<EventSet> {
        if end < start {
            return Err(SyncError::Range { start, end });
        }

        match overlap_with {
            Some(other) => self.overlap(person, other, start, end).await,
            None => self.cached_schedule(person, start, end).await,
        }
    }

    async fn overlap(
        &mut self,
        person: &Person,
        other: &Person,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncResult<EventSet> {
        if !self.may_go_online() {
            return Ok(EventSet::missing());
        }

        let fetched = async {
            let mine = self.remote.fetch(&person.id, start, end).await?;
            let theirs = self.remote.fetch(&other.id, start, end).await?;
            Ok::<_, SyncError>(mine.overlap(&theirs))
        }
        .await;

        match fetched {
            Ok(shared) => {
                self.went_online();
                debug!(person = %person.id, other = %other.id, shared = shared.len(), "Overlap");
                Ok(shared)
            }
            Err(e) if e.is_network() => {
                self.went_offline(&e);
                Ok(EventSet::missing())
            }
            Err(e) => Err(e),
        }
    }

    async fn cached_schedule(
        &mut self,
        person: &Person,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncResult<EventSet> {
        let mut changes = Vec::new();
        let mut union = EventSet::empty();
        let mut missing = false;

        for month in months_touched(start, end) {
            let key = PartitionKey::for_date(month, person.id.clone());
            let mut events = self.store.load(&key)?;

            if events.is_cache_miss() {
                match self.refresh_month(person, month).await? {
                    Some((fetched, diff)) => {
                        changes.extend(diff);
                        events = fetched;
                    }
                    None => missing = true,
                }
            }

            union = union.merge(&events);
        }

        self.last_changes = EventSet::new(changes);
        Ok(union.between(start, end).with_cache_miss(missing))
    }

    /// Fetch a whole month, save it and apply retention. `None` when offline.
    async fn refresh_month(
        &mut self,
        person: &Person,
        month: NaiveDate,
    ) -> SyncResult<Option<(EventSet, EventSet)>> {
        if !self.may_go_online() {
            debug!(person = %person.id, month = month.month(), "Offline, skipping fetch");
            return Ok(None);
        }

        let (first, last) = month_bounds(month);
        let fetched = match self.remote.fetch(&person.id, first, last).await {
            Ok(events) => {
                self.went_online();
                events
            }
            Err(e) if e.is_network() => {
                self.went_offline(&e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let key = PartitionKey::for_date(month, person.id.clone());
        let diff = self.store.save(&key, &fetched)?;
        info!(person = %person.id, month = key.month, changes = diff.len(), "Cached month");

        self.apply_retention(&key);
        Ok(Some((fetched, diff)))
    }

    /// Once the current month is saved, the month before it is dropped.
    fn apply_retention(&self, saved: &PartitionKey) {
        if saved.month != today().month() {
            return;
        }
        let previous = saved.previous();
        if let Err(e) = self.store.evict(&previous) {
            warn!(month = previous.month, person = %previous.person_id, error = %e, "Could not evict partition");
        }
    }

    /// Re-fetch the month containing `month`, save it and report what
    /// changed from today onward.
    pub async fn sync_month(&mut self, person: &Person, month: NaiveDate) -> SyncResult<EventSet> {
        if !self.may_go_online() {
            return Err(SyncError::Network("offline, retrying later".into()));
        }

        let (first, last) = month_bounds(month);
        let fetched = match self.remote.fetch(&person.id, first, last).await {
            Ok(events) => {
                self.went_online();
                events
            }
            Err(e) => {
                if e.is_network() {
                    self.went_offline(&e);
                }
                return Err(e);
            }
        };

        let key = PartitionKey::for_date(month, person.id.clone());
        let diff = self.store.save(&key, &fetched)?;
        self.apply_retention(&key);

        let upcoming = diff.between(today(), NaiveDate::MAX);
        debug!(total = diff.len(), upcoming = upcoming.len(), "Synced month");
        self.last_changes = diff;
        Ok(upcoming)
    }

    /// Today's schedule.
    pub async fn today(&mut self, person: &Person) -> SyncResult<EventSet> {
        let day = today();
        self.get_schedule(person, day, day, None).await
    }

    /// The event in progress right now.
    pub async fn now(&mut self, person: &Person) -> SyncResult<Option<Event>> {
        let day = self.today(person).await?;
        Ok(views::current_event(&day, now_local()).cloned())
    }

    /// The next event starting after now, today.
    pub async fn next(&mut self, person: &Person) -> SyncResult<Option<Event>> {
        let day = self.today(person).await?;
        Ok(views::next_event(&day, now_local()).cloned())
    }

    pub async fn day_status(&mut self, person: &Person) -> SyncResult<DayStatus> {
        let day = self.today(person).await?;
        Ok(views::day_status(&day, now_local()))
    }

    pub async fn on_an_event(&mut self, person: &Person) -> SyncResult<bool> {
        Ok(self.day_status(person).await? == DayStatus::OnEvent)
    }

    pub async fn on_break(&mut self, person: &Person) -> SyncResult<bool> {
        Ok(self.day_status(person).await? == DayStatus::OnBreak)
    }

    pub async fn on_non_working_time(&mut self, person: &Person) -> SyncResult<bool> {
        Ok(self.day_status(person).await? == DayStatus::NonWorking)
    }

    /// People matching `term`. Offline, this is an empty set.
    pub async fn search_person(&mut self, term: &str, by_id: bool) -> SyncResult<PersonSet> {
        if !self.may_go_online() {
            return Ok(PersonSet::default());
        }
        match self.remote.search_person(term, by_id).await {
            Ok(found) => {
                self.went_online();
                Ok(found)
            }
            Err(e) if e.is_network() => {
                self.went_offline(&e);
                Ok(PersonSet::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn fetch_attendees(&mut self, event_id: &str) -> SyncResult<PersonSet> {
        if !self.may_go_online() {
            return Ok(PersonSet::default());
        }
        match self.remote.fetch_attendees(event_id).await {
            Ok(found) => {
                self.went_online();
                Ok(found)
            }
            Err(e) if e.is_network() => {
                self.went_offline(&e);
                Ok(PersonSet::default())
            }
            Err(e) => Err(e),
        }
    }

    fn may_go_online(&self) -> bool {
        match self.offline_since {
            None => true,
            Some(since) => Utc::now() - since >= self.offline_retry,
        }
    }

    fn went_offline(&mut self, error: &SyncError) {
        if self.offline_since.is_none() {
            warn!(error = %error, "Remote unreachable, switching to offline mode");
        }
        self.offline_since = Some(Utc::now());
    }

    fn went_online(&mut self) {
        if self.offline_since.take().is_some() {
            info!("Remote reachable again, leaving offline mode");
        }
    }
}

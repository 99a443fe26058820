use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::constants::localize;
use crate::error::{SyncError, SyncResult};
use crate::event_set::EventSet;
use crate::person::PersonSet;
use crate::remote::envelope::{parse_attendees, parse_events, parse_persons};
use crate::remote::{Remote, ScheduleApi};
use crate::session::SessionManager;

type PasswordPrompt = dyn Fn() -> SyncResult<String> + Send + Sync;

#[derive(Clone)]
enum Password {
    Known(String),
    Prompt(Arc<PasswordPrompt>),
}

/// Login credentials for the portal.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    password: Password,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            email: email.into(),
            password: Password::Known(password.into()),
        }
    }

    /// Credentials whose password is only asked for when a login is
    /// actually needed.
    pub fn with_prompt(
        email: impl Into<String>,
        prompt: impl Fn() -> SyncResult<String> + Send + Sync + 'static,
    ) -> Self {
        Credentials {
            email: email.into(),
            password: Password::Prompt(Arc::new(prompt)),
        }
    }

    pub fn password(&self) -> SyncResult<String> {
        match &self.password {
            Password::Known(password) => Ok(password.clone()),
            Password::Prompt(prompt) => prompt(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// [`Remote`] over a raw [`ScheduleApi`], obtaining tokens from a shared
/// [`SessionManager`].
pub struct RemoteFetcher {
    api: Arc<dyn ScheduleApi>,
    sessions: Arc<SessionManager>,
    credentials: Credentials,
}

impl RemoteFetcher {
    pub fn new(
        api: Arc<dyn ScheduleApi>,
        sessions: Arc<SessionManager>,
        credentials: Credentials,
    ) -> Self {
        RemoteFetcher {
            api,
            sessions,
            credentials,
        }
    }

    async fn token(&self) -> SyncResult<String> {
        let held = self.sessions.current().await;
        let session = if held.is_usable() {
            held
        } else {
            let password = self.credentials.password()?;
            self.sessions
                .ensure_valid_session(&self.credentials.email, &password)
                .await?
        };

        session
            .token
            .ok_or_else(|| SyncError::Authentication("login returned no token".into()))
    }

    async fn search_once(&self, term: &str, by_id: bool, token: &str) -> SyncResult<PersonSet> {
        parse_persons(self.api.search_persons(term, by_id, token).await?)
    }

    /// Fill in group and affiliation dates of bare attendee records from a
    /// name search. Lookup failures keep the bare record.
    async fn enrich(&self, people: PersonSet, token: &str) -> PersonSet {
        let mut enriched = PersonSet::default();
        for person in people {
            if !person.is_employee() {
                enriched.insert(person);
                continue;
            }

            match self.search_once(&person.name, false, token).await {
                Ok(found) => match found.get(&person.id) {
                    Some(full) => {
                        enriched.insert(full.clone());
                    }
                    None => {
                        enriched.insert(person);
                    }
                },
                Err(e) => {
                    warn!(person = %person.id, error = %e, "Could not look up attendee");
                    enriched.insert(person);
                }
            }
        }
        enriched
    }
}

#[async_trait]
impl Remote for RemoteFetcher {
    async fn fetch(&self, person_id: &str, start: NaiveDate, end: NaiveDate) -> SyncResult<EventSet> {
        if end < start {
            return Err(SyncError::Range { start, end });
        }

        let time_min = localize(start, NaiveTime::MIN);
        let time_max = localize(end, NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1);

        let token = self.token().await?;
        debug!(person = person_id, %start, %end, "Fetching schedule");

        let body = self
            .api
            .search_events(
                person_id,
                time_min.with_timezone(&Utc),
                time_max.with_timezone(&Utc),
                &token,
            )
            .await?;
        let events = parse_events(body)
            .inspect_err(|e| warn!(person = person_id, error = %e, "Malformed schedule response"))?;

        debug!(person = person_id, count = events.len(), "Fetched schedule");
        Ok(events)
    }

    async fn fetch_attendees(&self, event_id: &str) -> SyncResult<PersonSet> {
        let token = self.token().await?;
        let people = parse_attendees(self.api.attendees(event_id, &token).await?)?;
        Ok(self.enrich(people, &token).await)
    }

    async fn search_person(&self, term: &str, by_id: bool) -> SyncResult<PersonSet> {
        let token = self.token().await?;
        let found = self.search_once(term, by_id, &token).await?;

        if found.is_empty() && term.contains('ё') {
            debug!(term, "No match, retrying with ё folded to е");
            return self.search_once(&term.replace('ё', "е"), by_id, &token).await;
        }
        Ok(found)
    }
}

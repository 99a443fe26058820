use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use modsync_core::SyncResult;
use modsync_core::remote::ScheduleApi;
use serde_json::{Value, json};
use tracing::debug;

use crate::{ModeusClient, network, read_json};

/// Largest page the events search accepts; a month of classes fits easily.
const EVENTS_PAGE_SIZE: u32 = 500;
const PERSONS_PAGE_SIZE: u32 = 10;

#[async_trait]
impl ScheduleApi for ModeusClient {
    async fn search_events(
        &self,
        person_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        token: &str,
    ) -> SyncResult<Value> {
        let body = json!({
            "size": EVENTS_PAGE_SIZE,
            "timeMin": time_min.to_rfc3339_opts(SecondsFormat::Secs, false),
            "timeMax": time_max.to_rfc3339_opts(SecondsFormat::Secs, false),
            "attendeePersonId": [person_id],
        });
        debug!(person = person_id, %time_min, %time_max, "POST events/search");

        let response = self
            .http
            .post(self.api_url("calendar/events/search"))
            .query(&[("tz", "Europe/Moscow")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        read_json(response).await
    }

    async fn search_persons(&self, term: &str, by_id: bool, token: &str) -> SyncResult<Value> {
        let field = if by_id { "id" } else { "fullName" };
        let mut body = json!({
            "size": PERSONS_PAGE_SIZE,
            "sort": "+fullName",
        });
        body[field] = json!(term);
        debug!(term, by_id, "POST persons/search");

        let response = self
            .http
            .post(self.api_url("people/persons/search"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        read_json(response).await
    }

    async fn attendees(&self, event_id: &str, token: &str) -> SyncResult<Value> {
        debug!(event = event_id, "GET attendees");

        let response = self
            .http
            .get(self.api_url(&format!("calendar/events/{event_id}/attendees")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(network)?;

        read_json(response).await
    }
}

//! HTTP collaborators for the Modeus schedule portal.
//!
//! [`ModeusClient`] implements both [`modsync_core::remote::ScheduleApi`]
//! (schedule, people and attendee searches) and
//! [`modsync_core::session::Authenticator`] (the form-based login that
//! yields an `id_token`).

mod api;
mod auth;

use std::sync::Arc;
use std::time::Duration;

use modsync_core::{SyncError, SyncResult};
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://narfu.modeus.org/schedule-calendar-v2/api";
pub const DEFAULT_AUTH_BASE: &str = "https://narfu-auth.modeus.org";

/// Where the login flow finally redirects to with the token in the fragment.
pub const APP_URL: &str = "https://narfu.modeus.org/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Modeus API and its login server.
///
/// Two HTTP clients share one cookie jar: `http` follows redirects,
/// `http_manual` does not, so the token-bearing redirect at the end of the
/// login flow can be read instead of followed.
#[derive(Clone)]
pub struct ModeusClient {
    http: reqwest::Client,
    http_manual: reqwest::Client,
    api_base: String,
    auth_base: String,
}

impl ModeusClient {
    pub fn new() -> SyncResult<Self> {
        Self::with_base_urls(DEFAULT_API_BASE, DEFAULT_AUTH_BASE)
    }

    /// Client against other hosts (a mirror, or a mock server in tests).
    pub fn with_base_urls(api_base: impl Into<String>, auth_base: impl Into<String>) -> SyncResult<Self> {
        let jar = Arc::new(Jar::default());

        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(network)?;

        let http_manual = reqwest::Client::builder()
            .cookie_provider(jar)
            .redirect(Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(network)?;

        Ok(ModeusClient {
            http,
            http_manual,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth_base: auth_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/{}", self.auth_base, path.trim_start_matches('/'))
    }
}

/// Transport failures (and anything reqwest reports outside of body
/// decoding) mean the remote could not be reached.
pub(crate) fn network(e: reqwest::Error) -> SyncError {
    if e.is_decode() {
        SyncError::RemoteFormat(e.to_string())
    } else {
        SyncError::Network(e.to_string())
    }
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json(response: Response) -> SyncResult<Value> {
    let status = response.status();
    let url = response.url().to_string();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::Authentication(format!("{url} answered {status}")));
    }
    if !status.is_success() {
        return Err(SyncError::Network(format!("{url} answered {status}")));
    }

    let body = response.text().await.map_err(network)?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(%url, error = %e, "Response is not JSON");
        SyncError::RemoteFormat(format!("{url}: {e}"))
    })
}

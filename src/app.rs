//! Wiring: settings, session, HTTP client, store and people on disk.

use std::sync::Arc;

use anyhow::{Context, Result};
use modsync_core::config::{DataDir, Settings};
use modsync_core::remote::{Credentials, RemoteFetcher};
use modsync_core::service::ScheduleService;
use modsync_core::session::{SessionManager, normalize_email};
use modsync_core::store::DirMonthStore;
use modsync_core::{Person, PersonSet, SyncError};
use modsync_modeus::ModeusClient;
use tracing::debug;

pub type Service = ScheduleService<DirMonthStore, RemoteFetcher>;

pub struct App {
    pub data: DataDir,
    pub people: PersonSet,
    pub sessions: Arc<SessionManager>,
    pub credentials: Credentials,
    pub service: Service,
}

impl App {
    pub fn load(email_override: Option<&str>) -> Result<Self> {
        let settings = Settings::load().context("Failed to load settings")?;
        let data = settings.data_dir();
        debug!(data_dir = %data.root().display(), "Loaded settings");

        let client = ModeusClient::new().context("Failed to create HTTP client")?;
        let sessions = Arc::new(
            SessionManager::load(Arc::new(client.clone()), data.session_path())
                .context("Failed to load session")?,
        );

        let email = email_override
            .map(str::to_string)
            .or(settings.email.clone())
            .unwrap_or_default();
        let credentials = if email.trim().is_empty() {
            Credentials::new("", "")
        } else {
            Credentials::with_prompt(normalize_email(&email), || {
                read_password().map_err(|e| SyncError::Authentication(e.to_string()))
            })
        };

        let fetcher = RemoteFetcher::new(Arc::new(client), sessions.clone(), credentials.clone());
        let service = ScheduleService::new(DirMonthStore::in_data_dir(&data), fetcher);

        let people = PersonSet::load(&data.people_path()).context("Failed to load people")?;

        Ok(App {
            data,
            people,
            sessions,
            credentials,
            service,
        })
    }

    pub fn current_person(&self) -> Result<Person> {
        self.people.current().cloned().context(
            "No person selected.\n\n\
            Find yourself with:\n  \
            modsync search <name> --select 1",
        )
    }

    pub fn person(&self, id: &str) -> Result<Person> {
        self.people
            .get(id)
            .cloned()
            .with_context(|| format!("Unknown person '{id}'. Run `modsync search` first."))
    }

    pub fn save_people(&self) -> Result<()> {
        self.people
            .save(&self.data.people_path())
            .context("Failed to save people")
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var("MODSYNC_PASSWORD") {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

//! Keeps a bearer token alive.
//!
//! The upstream token is valid for a fixed window after login. The manager
//! hands out the held session while it is usable and performs at most one
//! login at a time when it is not.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::constants::{EMAIL_DOMAIN, SESSION_TTL_HOURS};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Session {
            token: Some(token.into()),
            expires_at,
        }
    }

    /// A session nobody has logged in to yet.
    pub fn empty() -> Self {
        Session {
            token: None,
            expires_at: DateTime::<Utc>::default(),
        }
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.token.is_some() && now < self.expires_at
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    /// The bearer token, if the session is usable right now.
    pub fn bearer(&self) -> SyncResult<&str> {
        match &self.token {
            Some(token) if self.is_usable() => Ok(token),
            _ => Err(SyncError::Authentication("session expired".into())),
        }
    }
}

impl From<&SessionConfig> for Session {
    fn from(config: &SessionConfig) -> Self {
        Session {
            token: config.token.clone(),
            expires_at: config.expires_at(),
        }
    }
}

impl From<&Session> for SessionConfig {
    fn from(session: &Session) -> Self {
        SessionConfig {
            token: session.token.clone(),
            expires: session.expires_at.timestamp(),
        }
    }
}

/// Obtains a fresh bearer token from the remote login flow.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> SyncResult<String>;
}

/// Append the institutional domain to a bare login.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    if email.contains('@') {
        email.to_string()
    } else {
        format!("{email}{EMAIL_DOMAIN}")
    }
}

pub struct SessionManager {
    authenticator: Arc<dyn Authenticator>,
    config_path: Option<PathBuf>,
    session: Mutex<Session>,
}

impl SessionManager {
    /// Manager backed by the session file at `config_path`.
    pub fn load(authenticator: Arc<dyn Authenticator>, config_path: PathBuf) -> SyncResult<Self> {
        let session = Session::from(&SessionConfig::load(&config_path)?);
        debug!(usable = session.is_usable(), "Loaded session");

        Ok(SessionManager {
            authenticator,
            config_path: Some(config_path),
            session: Mutex::new(session),
        })
    }

    /// Manager that keeps the session in memory only.
    pub fn in_memory(authenticator: Arc<dyn Authenticator>, session: Session) -> Self {
        SessionManager {
            authenticator,
            config_path: None,
            session: Mutex::new(session),
        }
    }

    /// Return the held session if usable, otherwise log in once and persist
    /// the result.
    ///
    /// The lock is held across the login, so concurrent callers wait for the
    /// refresh in progress and then see its result.
    pub async fn ensure_valid_session(&self, email: &str, password: &str) -> SyncResult<Session> {
        let mut session = self.session.lock().await;
        if session.is_usable() {
            return Ok(session.clone());
        }

        info!("Session expired, logging in");
        self.refresh(&mut session, email, password).await
    }

    /// Log in even if the held session is still usable. On failure the held
    /// session is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> SyncResult<Session> {
        let mut session = self.session.lock().await;
        self.refresh(&mut session, email, password).await
    }

    async fn refresh(&self, session: &mut Session, email: &str, password: &str) -> SyncResult<Session> {
        let email = normalize_email(email);
        debug!(%email, "Logging in");

        let token = self.authenticator.login(&email, password).await?;
        *session = Session::new(token, Utc::now() + Duration::hours(SESSION_TTL_HOURS));

        if let Some(path) = &self.config_path
            && let Err(e) = SessionConfig::from(&*session).save(path)
        {
            warn!(path = %path.display(), error = %e, "Could not persist session");
        }

        Ok(session.clone())
    }

    /// The held session without refreshing it.
    pub async fn current(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Forget the held session, forcing a login on next use.
    pub async fn invalidate(&self) -> SyncResult<()> {
        let mut session = self.session.lock().await;
        *session = Session::empty();
        if let Some(path) = &self.config_path {
            SessionConfig::from(&*session).save(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuth {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for CountingAuth {
        async fn login(&self, _email: &str, password: &str) -> SyncResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if password == "wrong" {
                return Err(SyncError::Authentication("bad credentials".into()));
            }
            Ok("fresh-token".into())
        }
    }

    fn counting() -> Arc<CountingAuth> {
        Arc::new(CountingAuth {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("ivanov.i"), "ivanov.i@edu.narfu.ru");
        assert_eq!(normalize_email(" a@b.ru "), "a@b.ru");
    }

    #[test]
    fn test_usable_requires_token_and_future_expiry() {
        let now = Utc::now();
        assert!(Session::new("t", now + Duration::seconds(1)).is_usable_at(now));
        assert!(!Session::new("t", now).is_usable_at(now));
        assert!(!Session::empty().is_usable_at(now));
    }

    #[tokio::test]
    async fn test_usable_session_is_returned_without_login() {
        let auth = counting();
        let held = Session::new("held", Utc::now() + Duration::hours(1));
        let manager = SessionManager::in_memory(auth.clone(), held.clone());

        let session = manager.ensure_valid_session("x", "y").await.unwrap();
        assert_eq!(session, held);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_logs_in_once() {
        let auth = counting();
        let expired = Session::new("old", Utc::now() - Duration::seconds(1));
        let manager = Arc::new(SessionManager::in_memory(auth.clone(), expired));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.ensure_valid_session("user", "pw").await })
            })
            .collect();

        for handle in handles {
            let session = handle.await.unwrap().unwrap();
            assert_eq!(session.token.as_deref(), Some("fresh-token"));
        }
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_sets_twelve_hour_expiry_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let manager = SessionManager::load(counting(), path.clone()).unwrap();

        let before = Utc::now();
        let session = manager.ensure_valid_session("user", "pw").await.unwrap();
        let after = Utc::now();
        assert!(before + Duration::hours(12) <= session.expires_at);
        assert!(session.expires_at <= after + Duration::hours(12));

        let stored = SessionConfig::load(&path).unwrap();
        assert_eq!(stored.token.as_deref(), Some("fresh-token"));
        assert_eq!(stored.expires, session.expires_at.timestamp());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_session_unusable() {
        let manager = SessionManager::in_memory(counting(), Session::empty());

        let result = manager.ensure_valid_session("user", "wrong").await;
        assert!(matches!(result, Err(SyncError::Authentication(_))));
        assert!(!manager.current().await.is_usable());
    }

    #[tokio::test]
    async fn test_forced_login_replaces_usable_session() {
        let auth = counting();
        let held = Session::new("held", Utc::now() + Duration::hours(1));
        let manager = SessionManager::in_memory(auth.clone(), held);

        let session = manager.login("user", "pw").await.unwrap();
        assert_eq!(session.token.as_deref(), Some("fresh-token"));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_forced_login_keeps_held_session() {
        let held = Session::new("held", Utc::now() + Duration::hours(1));
        let manager = SessionManager::in_memory(counting(), held.clone());

        let result = manager.login("user", "wrong").await;
        assert!(matches!(result, Err(SyncError::Authentication(_))));
        assert_eq!(manager.current().await, held);
    }
}

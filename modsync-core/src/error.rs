//! Error types for modsync.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while syncing a schedule.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Bad credentials or a login flow we could not follow.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport failure: DNS, TLS, timeouts, refused connections.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote answered, but not in the shape we expect.
    #[error("Unexpected response from remote: {0}")]
    RemoteFormat(String),

    #[error("Invalid date range: {end} is before {start}")]
    Range { start: NaiveDate, end: NaiveDate },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No person with id '{0}'")]
    UnknownPerson(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Whether this error means the remote was unreachable (as opposed to
    /// reachable but unhappy).
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type alias for modsync operations.
pub type SyncResult<T> = Result<T, SyncError>;

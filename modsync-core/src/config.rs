//! Typed configuration: user settings, the persisted session and the data
//! directory layout.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::store::PartitionKey;

static DEFAULT_DATA_DIR: &str = "~/.local/share/modsync";

/// Must differ: on macOS and Windows the config and data directories
/// coincide.
const SETTINGS_FILE: &str = "settings.toml";
const SESSION_FILE: &str = "config.toml";

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("modsync"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// User settings at ~/.config/modsync/settings.toml, overridable with
/// `MODSYNC_*` environment variables.
///
/// The password is never read from here; it comes from `MODSYNC_PASSWORD` or
/// an interactive prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub email: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: default_data_dir(),
            email: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> SyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
            .join("modsync");

        Ok(config_dir.join(SETTINGS_FILE))
    }

    pub fn load() -> SyncResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> SyncResult<Self> {
        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix("MODSYNC").try_parsing(false))
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn data_dir(&self) -> DataDir {
        let expanded = shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned();
        DataDir::new(expanded)
    }
}

/// Files owned by the sync engine under the data directory.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn partition_path(&self, key: &PartitionKey) -> PathBuf {
        self.cache_dir().join(key.file_name())
    }

    pub fn people_path(&self) -> PathBuf {
        self.root.join("people.json")
    }
}

/// The persisted session: `{ token, expires }` with `expires` as a unix
/// timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub expires: i64,
}

impl SessionConfig {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires, 0).unwrap_or_default()
    }

    /// Load the session file. A missing file yields an empty, unusable session.
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(SessionConfig::default());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            SyncError::Config(format!("Could not parse {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = path.with_extension("toml.tmp");
        std::fs::write(&temp, content)?;

        // Owner-only, the file holds a bearer token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&temp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = SessionConfig {
            token: Some("abc.def".into()),
            expires: 1_720_000_000,
        };
        config.save(&path).unwrap();

        assert_eq!(SessionConfig::load(&path).unwrap(), config);
        assert!(!dir.path().join("config.toml.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        SessionConfig::default().save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_session_config_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert!(config.token.is_none());
        assert_eq!(config.expires_at(), DateTime::<Utc>::default());
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_dir = \"/tmp/modsync-test\"\nemail = \"ivanov.i\"\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/modsync-test"));
        assert_eq!(settings.email.as_deref(), Some("ivanov.i"));
    }

    #[test]
    fn test_data_dir_layout() {
        let data = DataDir::new("/data");
        let key = PartitionKey::new(7, "p/1");

        assert_eq!(data.session_path(), PathBuf::from("/data/config.toml"));
        assert_eq!(data.people_path(), PathBuf::from("/data/people.json"));
        assert_eq!(data.partition_path(&key), PathBuf::from("/data/cache/7.p_1.json"));
    }

    #[test]
    fn test_settings_and_session_files_never_collide() {
        let dir = tempfile::tempdir().unwrap();

        // Data dir resolving to the config dir, as on macOS and Windows
        let data = DataDir::new(dir.path());
        assert_ne!(data.session_path(), dir.path().join(SETTINGS_FILE));

        if let Ok(settings) = Settings::config_path() {
            assert_eq!(settings.file_name().unwrap(), SETTINGS_FILE);
        }
    }
}

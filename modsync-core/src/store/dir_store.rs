use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::DataDir;
use crate::diff::diff;
use crate::error::SyncResult;
use crate::event::Event;
use crate::event_set::EventSet;
use crate::store::{MonthStore, PartitionKey};

/// Month store backed by a directory of JSON files, one per partition.
#[derive(Debug, Clone)]
pub struct DirMonthStore {
    dir: PathBuf,
}

impl DirMonthStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirMonthStore { dir: dir.into() }
    }

    pub fn in_data_dir(data: &DataDir) -> Self {
        Self::new(data.cache_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &PartitionKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl MonthStore for DirMonthStore {
    fn load(&self, key: &PartitionKey) -> SyncResult<EventSet> {
        let path = self.path(key);
        if !path.exists() {
            debug!(month = key.month, person = %key.person_id, "Cache miss");
            return Ok(EventSet::missing());
        }

        let content = std::fs::read_to_string(&path)?;
        let events: Vec<Event> = serde_json::from_str(&content)?;
        debug!(month = key.month, person = %key.person_id, count = events.len(), "Cache hit");
        Ok(EventSet::new(events))
    }

    fn save(&self, key: &PartitionKey, events: &EventSet) -> SyncResult<EventSet> {
        let previous = self.load(key)?;
        let changes = diff(events, &previous);

        std::fs::create_dir_all(&self.dir)?;

        let path = self.path(key);
        let temp = path.with_extension("json.tmp");

        let clean: Vec<Event> = events.iter().cloned().map(Event::unmarked).collect();
        let content = serde_json::to_string_pretty(&clean)?;

        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &path)?;

        debug!(
            month = key.month,
            person = %key.person_id,
            stored = clean.len(),
            changed = changes.len(),
            "Saved partition"
        );
        Ok(changes)
    }

    fn evict(&self, key: &PartitionKey) -> SyncResult<()> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => {
                debug!(month = key.month, person = %key.person_id, "Evicted partition");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

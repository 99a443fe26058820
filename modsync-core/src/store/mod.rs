//! Month-partitioned local schedule cache.
//!
//! A partition holds one person's events for one calendar month. Partitions
//! are keyed by month number only, so July of one year and July of the next
//! share a file.

mod dir_store;

pub use dir_store::DirMonthStore;

use chrono::{Datelike, NaiveDate};

use crate::error::SyncResult;
use crate::event_set::EventSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// 1..=12
    pub month: u32,
    pub person_id: String,
}

impl PartitionKey {
    pub fn new(month: u32, person_id: impl Into<String>) -> Self {
        PartitionKey {
            month,
            person_id: person_id.into(),
        }
    }

    pub fn for_date(date: NaiveDate, person_id: impl Into<String>) -> Self {
        Self::new(date.month(), person_id)
    }

    /// The partition of the month before, wrapping January to December.
    pub fn previous(&self) -> Self {
        let month = if self.month <= 1 { 12 } else { self.month - 1 };
        Self::new(month, self.person_id.clone())
    }

    pub fn file_name(&self) -> String {
        let person_slug = self.person_id.replace(['/', '\\', ':'], "_");
        format!("{}.{}.json", self.month, person_slug)
    }
}

/// Storage for month partitions.
pub trait MonthStore {
    /// Read a partition. A partition that was never written is not an error:
    /// it comes back as an empty set with `cache_miss` set.
    fn load(&self, key: &PartitionKey) -> SyncResult<EventSet>;

    /// Overwrite a partition with `events` and return what changed relative
    /// to the previous contents.
    ///
    /// Events dropped by the new snapshot show up as `Removed` in the result.
    /// The existing file is left intact if the write fails.
    fn save(&self, key: &PartitionKey, events: &EventSet) -> SyncResult<EventSet>;

    /// Remove a partition. Removing a missing partition succeeds.
    fn evict(&self, key: &PartitionKey) -> SyncResult<()>;

    /// Merge `events` into the stored partition, newer values winning, and
    /// return what changed.
    fn append(&self, key: &PartitionKey, events: &EventSet) -> SyncResult<EventSet> {
        let stored = self.load(key)?;
        self.save(key, &stored.merge(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_wraps_january() {
        assert_eq!(PartitionKey::new(1, "p").previous().month, 12);
        assert_eq!(PartitionKey::new(7, "p").previous().month, 6);
    }

    #[test]
    fn test_key_for_date() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
        assert_eq!(PartitionKey::for_date(date, "p"), PartitionKey::new(7, "p"));
    }

    #[test]
    fn test_file_name_sanitizes_person_id() {
        assert_eq!(PartitionKey::new(3, "a/b:c").file_name(), "3.a_b_c.json");
    }
}

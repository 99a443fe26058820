use crate::diff::DiffKind;
use crate::event_set::EventSet;

/// Labelled change-set between two snapshots.
///
/// - id only in `new`: cloned, marked `Added`
/// - id only in `old`: cloned, marked `Removed`
/// - id in both with differing fields: new version, marked `Modified` with
///   the changed field names
/// - id in both with equal fields: omitted
///
/// A confirmed-empty `old` (not a cache-miss placeholder) yields an empty
/// result: with no baseline there is nothing to call "new".
pub fn diff(new: &EventSet, old: &EventSet) -> EventSet {
    if old.is_empty() && !old.is_cache_miss() {
        return EventSet::empty();
    }

    let old_by_id = old.by_id();
    let new_by_id = new.by_id();

    let mut changes = Vec::new();

    for event in new {
        match old_by_id.get(event.id.as_str()) {
            None => changes.push(event.clone().marked(DiffKind::Added)),
            Some(previous) => {
                let fields = event.field_changes(previous);
                if !fields.is_empty() {
                    changes.push(event.clone().marked_modified(fields));
                }
            }
        }
    }

    for event in old {
        if !new_by_id.contains_key(event.id.as_str()) {
            changes.push(event.clone().marked(DiffKind::Removed));
        }
    }

    EventSet::new(changes)
}

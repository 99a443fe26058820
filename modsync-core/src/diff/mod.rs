//! Change detection between two schedule snapshots.

mod diff_kind;
mod event_field;
mod schedule_diff;

pub use diff_kind::DiffKind;
pub use event_field::EventField;
pub use schedule_diff::diff;

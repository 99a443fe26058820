//! Core engine for modsync.
//!
//! This crate owns everything between the remote Modeus API and the
//! consumers (CLI, GUI, bots):
//! - `event` / `person` value types and their collections
//! - `session` for keeping a bearer token alive
//! - `remote` for turning API envelopes into typed collections
//! - `store` for the month-partitioned local cache
//! - `diff` for labelled change-sets between two snapshots
//! - `service` for the cache-or-fetch orchestration
//! - `views` and `ics` for read-only projections of a schedule

pub mod config;
pub mod constants;
pub mod diff;
pub mod error;
pub mod event;
pub mod event_set;
pub mod ics;
pub mod person;
pub mod remote;
pub mod service;
pub mod session;
pub mod store;
pub mod views;

pub use error::{SyncError, SyncResult};
pub use event::Event;
pub use event_set::EventSet;
pub use person::{Person, PersonSet, Role};
pub use service::ScheduleService;
pub use session::{Session, SessionManager};
pub use store::{DirMonthStore, MonthStore, PartitionKey};

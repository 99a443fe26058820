pub mod attendees;
pub mod export;
pub mod login;
pub mod now;
pub mod schedule;
pub mod search;
pub mod sync;

use chrono::NaiveDate;
use modsync_core::EventSet;
use modsync_core::constants::today;
use owo_colors::OwoColorize;

use crate::app::App;

/// `--from` defaults to today, `--to` to `--from`.
pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let start = from.unwrap_or_else(today);
    (start, to.unwrap_or(start))
}

/// Warn when results came from an incomplete cache.
pub fn report_offline(app: &App, events: &EventSet) {
    if app.service.is_offline() || events.is_cache_miss() {
        eprintln!(
            "{}",
            "Modeus is unreachable, showing cached data (may be incomplete)".yellow()
        );
    }
}

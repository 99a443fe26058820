use anyhow::Result;
use chrono::NaiveDate;
use modsync_core::constants::today;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::render_changes;
use crate::utils::tui::create_spinner;

pub async fn run(email: Option<&str>, month: Option<NaiveDate>) -> Result<()> {
    let mut app = App::load(email)?;
    let person = app.current_person()?;
    let month = month.unwrap_or_else(today);

    let spinner = create_spinner(format!("Syncing {}", month.format("%Y-%m")));
    let result = app.service.sync_month(&person, month).await;
    spinner.finish_and_clear();
    let upcoming = result?;

    println!("{} {}", person.name.bold(), month.format("%Y-%m").dimmed());
    println!("{}", render_changes(&upcoming, false));

    let earlier = app.service.last_changes().len().saturating_sub(upcoming.len());
    if earlier > 0 {
        println!("   {}", format!("({earlier} changes in past days not shown)").dimmed());
    }
    Ok(())
}

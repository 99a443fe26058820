use std::fs;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use modsync_core::ics;
use owo_colors::OwoColorize;

use super::{date_range, report_offline};
use crate::app::App;
use crate::utils::tui::create_spinner;

pub async fn run(
    email: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    output: &str,
) -> Result<()> {
    let mut app = App::load(email)?;
    let person = app.current_person()?;
    let (start, end) = date_range(from, to);

    let spinner = create_spinner(format!("{} {start}..{end}", person.name));
    let result = app.service.get_schedule(&person, start, end, None).await;
    spinner.finish_and_clear();
    let events = result?;
    report_offline(&app, &events);

    let calendar = ics::export(&events);
    if output == "-" {
        print!("{calendar}");
        return Ok(());
    }

    fs::write(output, calendar).with_context(|| format!("Failed to write {output}"))?;
    eprintln!(
        "{} {} classes written to {}",
        "✓".green(),
        events.len(),
        output.bold()
    );
    Ok(())
}

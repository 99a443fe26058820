use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;

use super::{date_range, report_offline};
use crate::app::App;
use crate::render::render_schedule;
use crate::utils::tui::create_spinner;

pub async fn run(
    email: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    with: Option<&str>,
) -> Result<()> {
    let mut app = App::load(email)?;
    let person = app.current_person()?;
    let other = with.map(|id| app.person(id)).transpose()?;
    let (start, end) = date_range(from, to);

    let spinner = create_spinner(format!("{} {start}..{end}", person.name));
    let result = app.service.get_schedule(&person, start, end, other.as_ref()).await;
    spinner.finish_and_clear();
    let events = result?;

    match &other {
        Some(other) => println!("{} ∩ {}", person.name.bold(), other.name.bold()),
        None => println!("{}", person.name.bold()),
    }
    println!("{}", render_schedule(&events));
    report_offline(&app, &events);
    Ok(())
}

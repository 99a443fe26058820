use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::Render;
use crate::utils::tui::create_spinner;

pub async fn run(email: Option<&str>, term: &str, by_id: bool, select_nth: Option<usize>) -> Result<()> {
    let mut app = App::load(email)?;

    let spinner = create_spinner(format!("Searching for \"{term}\""));
    let result = app.service.search_person(term, by_id).await;
    spinner.finish_and_clear();

    let mut found = result?;
    if found.is_empty() && app.service.is_offline() {
        // Fall back to people seen before
        found = app.people.search(term);
    }

    if found.is_empty() {
        println!("{}", "No one found".dimmed());
        return Ok(());
    }

    for (i, person) in found.iter().enumerate() {
        println!("{:>3}. {}", i + 1, person.render());
    }

    let chosen = match select_nth {
        Some(n) => match n.checked_sub(1).and_then(|i| found.iter().nth(i)) {
            Some(person) => Some(person.id.clone()),
            None => bail!("--select {n} is out of range (1..={})", found.len()),
        },
        None => None,
    };

    app.people.merge(found);
    if let Some(id) = chosen {
        app.people.set_current(&id)?;
        if let Some(person) = app.people.current() {
            println!("\nNow showing the schedule of {}", person.name.bold());
        }
    }
    app.save_people()
}

/// Make an already known person current.
pub fn select(person_id: &str) -> Result<()> {
    let settings = modsync_core::config::Settings::load()?;
    let path = settings.data_dir().people_path();
    let mut people = modsync_core::PersonSet::load(&path)?;

    if people.set_current(person_id).is_err() {
        bail!("Unknown person '{person_id}'. Run `modsync search` first.");
    }
    people.save(&path)?;

    if let Some(person) = people.current() {
        println!("Now showing the schedule of {}", person.render());
    }
    Ok(())
}

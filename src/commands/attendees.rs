use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::Render;
use crate::utils::tui::create_spinner;

pub async fn run(email: Option<&str>, event_id: &str) -> Result<()> {
    let mut app = App::load(email)?;

    let spinner = create_spinner("Fetching attendees".to_string());
    let result = app.service.fetch_attendees(event_id).await;
    spinner.finish_and_clear();
    let attendees = result?;

    if attendees.is_empty() {
        let reason = if app.service.is_offline() {
            "Modeus is unreachable"
        } else {
            "No attendees"
        };
        println!("{}", reason.dimmed());
        return Ok(());
    }

    let employees = attendees.employees();
    let students = attendees.students();
    for (heading, group) in [("Teachers", &employees), ("Students", &students)] {
        if group.is_empty() {
            continue;
        }
        println!("{} {}", heading.bold(), format!("({})", group.len()).dimmed());
        for person in group.iter() {
            println!("   {}", person.render());
        }
    }

    // Remember them so `modsync use` and `--with` can find them
    app.people.merge(attendees);
    app.save_people()
}

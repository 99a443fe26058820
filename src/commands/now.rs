use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::Render;

pub async fn run(email: Option<&str>) -> Result<()> {
    let mut app = App::load(email)?;
    let person = app.current_person()?;

    let status = app.service.day_status(&person).await?;
    println!("{} {}", person.name.bold(), status.render());

    if let Some(event) = app.service.now(&person).await? {
        println!("   {} {}", "now ".dimmed(), event.render());
    }
    match app.service.next(&person).await? {
        Some(event) => println!("   {} {}", "next".dimmed(), event.render()),
        None => println!("   {}", "No more classes today".dimmed()),
    }
    Ok(())
}

use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use crate::app::App;
use crate::utils::tui::create_spinner;

pub async fn run(email: Option<&str>) -> Result<()> {
    let app = App::load(email)?;
    let email = &app.credentials.email;
    if email.is_empty() {
        bail!(
            "No login configured.\n\n\
            Pass --email <login> or set `email` in {}",
            modsync_core::config::Settings::config_path()?.display()
        );
    }

    let password = app.credentials.password()?;

    // The held session is only replaced once the new login succeeds
    let spinner = create_spinner(format!("Logging in as {email}"));
    let result = app.sessions.login(email, &password).await;
    spinner.finish_and_clear();

    let session = result?;
    println!(
        "{} Logged in as {} {}",
        "✓".green(),
        email.bold(),
        format!("(valid until {})", session.expires_at.format("%Y-%m-%d %H:%M UTC")).dimmed()
    );
    Ok(())
}

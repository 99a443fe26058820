mod app;
mod commands;
mod render;
mod utils;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modsync")]
#[command(about = "Fetch, cache and diff your Modeus class schedule")]
struct Cli {
    /// Login (a bare name gets @edu.narfu.ru appended). Overrides config.
    #[arg(long, global = true)]
    email: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login,
    /// Search people by name (or id) and remember the results
    Search {
        term: String,

        /// Treat the term as a person id
        #[arg(long)]
        id: bool,

        /// Make the N-th result (1-based) the current person
        #[arg(long)]
        select: Option<usize>,
    },
    /// Make a remembered person the current one
    Use { person_id: String },
    /// Show the schedule of the current person
    Schedule {
        /// First day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD), defaults to --from
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only classes shared with this person (id)
        #[arg(long)]
        with: Option<String>,
    },
    /// Re-fetch a month and show what changed from today on
    Sync {
        /// Any day of the month to sync (YYYY-MM-DD), defaults to today
        #[arg(long)]
        month: Option<NaiveDate>,
    },
    /// What is going on right now
    Now,
    /// Who attends a class
    Attendees { event_id: String },
    /// Write the schedule as an iCalendar file
    Export {
        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output path, "-" for stdout
        #[arg(short, long, default_value = "schedule.ics")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so schedule output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let email = cli.email.as_deref();

    match cli.command {
        Commands::Login => commands::login::run(email).await,
        Commands::Search { term, id, select } => commands::search::run(email, &term, id, select).await,
        Commands::Use { person_id } => commands::search::select(&person_id),
        Commands::Schedule { from, to, with } => {
            commands::schedule::run(email, from, to, with.as_deref()).await
        }
        Commands::Sync { month } => commands::sync::run(email, month).await,
        Commands::Now => commands::now::run(email).await,
        Commands::Attendees { event_id } => commands::attendees::run(email, &event_id).await,
        Commands::Export { from, to, output } => commands::export::run(email, from, to, &output).await,
    }
}

use quiz_core::model::SubjectId;
use services::{Clock, QuizServices, SharedController};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod args;
mod play;

use args::{AppConfig, ArgsError, Command, Parsed, print_usage};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUIZ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = AppConfig::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;
    let config = match parsed {
        Parsed::Run(config) => config,
        Parsed::Help => {
            print_usage();
            return Ok(());
        }
    };
    debug!(db = %config.db_url, command = ?config.command, "starting");

    // sqlx will not create a missing database file on its own.
    prepare_sqlite_file(&config.db_url)?;
    let services =
        QuizServices::new_sqlite(&config.db_url, Clock::default(), config.settings, config.bank)
            .await?;
    let controller = services.controller();

    match config.command {
        Command::Subjects { search } => {
            let subjects = services.list_subjects(search.as_deref()).await?;
            if subjects.is_empty() {
                println!("No subjects found.");
            }
            for subject in subjects {
                println!(
                    "{:<16} {:<28} {:>3} questions  {:>3} min",
                    subject.id.as_str(),
                    subject.name,
                    subject.question_count,
                    subject.time_in_minutes
                );
            }
            Ok(())
        }
        Command::Play { subject } => play_subject(controller, config.player, &subject).await,
        Command::Leaderboard { subject } => {
            let entries = controller.lock().await.leaderboard_for(&subject).await?;
            if entries.is_empty() {
                println!("No scores for {subject} yet.");
            }
            for (i, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}. {:<20} {:>3}  {}",
                    i + 1,
                    entry.player.as_str(),
                    entry.score,
                    entry.submitted_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        Command::Logout => {
            let mut c = controller.lock().await;
            if c.load_player_name().await.is_none() {
                println!("Nobody is signed in.");
                return Ok(());
            }
            c.clear_all_data().await?;
            println!("Signed out; saved quizzes were removed.");
            Ok(())
        }
    }
}

async fn play_subject(
    controller: SharedController,
    player: Option<String>,
    subject: &SubjectId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let signed_in = {
        let mut c = controller.lock().await;
        match player {
            Some(name) => {
                c.save_player_name(&name).await?;
                true
            }
            None => c.load_player_name().await.is_some(),
        }
    };
    if !signed_in && !play::prompt_player(&controller, &mut input).await? {
        return Ok(());
    }

    play::run(controller, subject, &mut input).await
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{Question, Subject, SubjectId};
use serde::Deserialize;
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    file: Option<PathBuf>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite://quiz.sqlite3?mode=rwc".into());
        let mut file = std::env::var("QUIZ_SEED_FILE").ok().map(PathBuf::from);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--file" => {
                    file = Some(PathBuf::from(require_value(&mut args, "--file")?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, file })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3?mode=rwc)");
    eprintln!("  --file <path>             JSON question bank to load (default: built-in sample)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_SEED_FILE");
}

/// On-disk bank layout: a list of subjects, each with its questions.
#[derive(Debug, Deserialize)]
struct BankFile {
    subjects: Vec<BankSubject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankSubject {
    id: String,
    name: String,
    time_in_minutes: Option<u32>,
    questions: Vec<Question>,
}

fn sample_bank() -> BankFile {
    let q = |prompt: &str, options: [&str; 4], correct: usize, explanation: Option<&str>| {
        Question::new(
            prompt,
            options.iter().map(ToString::to_string).collect(),
            correct,
            explanation.map(ToString::to_string),
        )
    };
    BankFile {
        subjects: vec![
            BankSubject {
                id: "rust".into(),
                name: "Rust Basics".into(),
                time_in_minutes: None,
                questions: vec![
                    q(
                        "Which keyword declares a mutable binding?",
                        ["let mut", "var", "mut let", "let!"],
                        0,
                        Some("Bindings are immutable unless marked `mut`."),
                    ),
                    q(
                        "What does `?` do on a `Result`?",
                        ["Panics", "Propagates the error", "Ignores it", "Logs it"],
                        1,
                        None,
                    ),
                    q(
                        "Which type owns a heap-allocated string?",
                        ["&str", "char", "String", "Cow<'static, str>"],
                        2,
                        None,
                    ),
                ],
            },
            BankSubject {
                id: "sql".into(),
                name: "SQL Fundamentals".into(),
                time_in_minutes: None,
                questions: vec![
                    q(
                        "Which clause filters grouped rows?",
                        ["WHERE", "HAVING", "ORDER BY", "LIMIT"],
                        1,
                        Some("WHERE filters rows before grouping; HAVING after."),
                    ),
                    q(
                        "Which join keeps unmatched rows from the left table?",
                        ["INNER", "CROSS", "RIGHT", "LEFT"],
                        3,
                        None,
                    ),
                ],
            },
        ],
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let bank = match &args.file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<BankFile>(&raw)?
        }
        None => sample_bank(),
    };

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;

    let mut total_questions = 0_usize;
    for entry in &bank.subjects {
        let question_count = u32::try_from(entry.questions.len())?;
        let subject = Subject {
            id: SubjectId::new(entry.id.clone()),
            name: entry.name.clone(),
            time_in_minutes: entry.time_in_minutes.unwrap_or(question_count),
            question_count,
        };
        repo.upsert_subject(&subject).await?;
        repo.replace_questions(&subject.id, &entry.questions).await?;
        total_questions += entry.questions.len();
    }

    println!(
        "Seeded {} subjects with {} questions into {}",
        bank.subjects.len(),
        total_questions,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use std::fmt;
use std::time::Duration;

use quiz_core::model::{SECONDS_PER_QUESTION, SubjectId};
use services::{ControllerSettings, RemoteBankConfig};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingSubject,
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidSeconds { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingSubject => write!(f, "--subject is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSeconds { raw } => {
                write!(f, "invalid --seconds-per-question value: {raw}")
            }
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

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz subjects    [--search <text>]");
    eprintln!("  quiz play        --subject <id>");
    eprintln!("  quiz leaderboard --subject <id>");
    eprintln!("  quiz logout");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url>              default sqlite://quiz.sqlite3");
    eprintln!("  --player <name>");
    eprintln!("  --bank-url <url>               remote question bank");
    eprintln!("  --seconds-per-question <n>     default {SECONDS_PER_QUESTION}");
    eprintln!("  --shuffle");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_PLAYER, QUIZ_BANK_URL, QUIZ_SECONDS_PER_QUESTION,");
    eprintln!("  QUIZ_SHUFFLE, QUIZ_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subjects { search: Option<String> },
    Play { subject: SubjectId },
    Leaderboard { subject: SubjectId },
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Subjects,
    Play,
    Leaderboard,
    Logout,
}

impl CommandKind {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "subjects" => Some(Self::Subjects),
            "play" => Some(Self::Play),
            "leaderboard" => Some(Self::Leaderboard),
            "logout" => Some(Self::Logout),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub command: Command,
    pub db_url: String,
    pub player: Option<String>,
    pub bank: Option<RemoteBankConfig>,
    pub settings: ControllerSettings,
}

/// Outcome of argument parsing.
#[derive(Debug)]
pub enum Parsed {
    Run(AppConfig),
    Help,
}

impl AppConfig {
    /// Parse `argv` (without the program name), reading defaults through `env`.
    pub fn parse(
        argv: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Parsed, ArgsError> {
        let mut args = argv.into_iter().peekable();
        // Flags without a subcommand list subjects.
        let kind = match args.next_if(|first| !first.starts_with('-')) {
            None => CommandKind::Subjects,
            Some(first) => {
                CommandKind::from_arg(&first).ok_or(ArgsError::UnknownCommand(first))?
            }
        };

        let mut db_url = env("QUIZ_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);
        let mut player = env("QUIZ_PLAYER").filter(|v| !v.trim().is_empty());
        let mut bank_url = env("QUIZ_BANK_URL").filter(|v| !v.trim().is_empty());
        let mut seconds = match env("QUIZ_SECONDS_PER_QUESTION") {
            Some(raw) => parse_seconds(raw)?,
            None => SECONDS_PER_QUESTION,
        };
        let mut shuffle = env("QUIZ_SHUFFLE").is_some_and(|v| is_truthy(&v));
        let mut search = None;
        let mut subject = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--player" => player = Some(require_value(&mut args, "--player")?),
                "--bank-url" => bank_url = Some(require_value(&mut args, "--bank-url")?),
                "--seconds-per-question" => {
                    seconds = parse_seconds(require_value(&mut args, "--seconds-per-question")?)?;
                }
                "--shuffle" => shuffle = true,
                "--search" if kind == CommandKind::Subjects => {
                    search = Some(require_value(&mut args, "--search")?);
                }
                "--subject" if matches!(kind, CommandKind::Play | CommandKind::Leaderboard) => {
                    subject = Some(SubjectId::new(require_value(&mut args, "--subject")?));
                }
                "--help" | "-h" => return Ok(Parsed::Help),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match kind {
            CommandKind::Subjects => Command::Subjects { search },
            CommandKind::Play => Command::Play {
                subject: subject.ok_or(ArgsError::MissingSubject)?,
            },
            CommandKind::Leaderboard => Command::Leaderboard {
                subject: subject.ok_or(ArgsError::MissingSubject)?,
            },
            CommandKind::Logout => Command::Logout,
        };

        Ok(Parsed::Run(Self {
            command,
            db_url,
            player,
            bank: bank_url.map(|url| RemoteBankConfig::new(url.trim())),
            settings: ControllerSettings {
                seconds_per_question: seconds,
                shuffle_questions: shuffle,
                tick_period: Duration::from_secs(1),
            },
        }))
    }
}

fn parse_seconds(raw: String) -> Result<u32, ArgsError> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ArgsError::InvalidSeconds { raw }),
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn run(parsed: Parsed) -> AppConfig {
        match parsed {
            Parsed::Run(config) => config,
            Parsed::Help => panic!("expected a runnable config"),
        }
    }

    #[test]
    fn defaults_to_subject_listing() {
        let config = run(AppConfig::parse(argv(&[]), no_env).unwrap());
        assert_eq!(config.command, Command::Subjects { search: None });
        assert_eq!(config.db_url, "sqlite://quiz.sqlite3");
        assert_eq!(config.settings, ControllerSettings::default());
        assert!(config.bank.is_none());
    }

    #[test]
    fn flags_override_environment() {
        let env = |key: &str| match key {
            "QUIZ_PLAYER" => Some("Env Player".to_string()),
            "QUIZ_SECONDS_PER_QUESTION" => Some("30".to_string()),
            "QUIZ_SHUFFLE" => Some("yes".to_string()),
            _ => None,
        };
        let config = run(
            AppConfig::parse(
                argv(&["play", "--subject", "geo", "--player", "Ada", "--seconds-per-question", "45"]),
                env,
            )
            .unwrap(),
        );
        assert_eq!(
            config.command,
            Command::Play {
                subject: SubjectId::new("geo")
            }
        );
        assert_eq!(config.player.as_deref(), Some("Ada"));
        assert_eq!(config.settings.seconds_per_question, 45);
        assert!(config.settings.shuffle_questions);
    }

    #[test]
    fn leading_flags_imply_subject_listing() {
        let config = run(AppConfig::parse(argv(&["--search", "java"]), no_env).unwrap());
        assert_eq!(
            config.command,
            Command::Subjects {
                search: Some("java".into())
            }
        );
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        let err = AppConfig::parse(argv(&["dance"]), no_env).unwrap_err();
        assert_eq!(err, ArgsError::UnknownCommand("dance".into()));
    }

    #[test]
    fn play_without_subject_is_rejected() {
        let err = AppConfig::parse(argv(&["play"]), no_env).unwrap_err();
        assert_eq!(err, ArgsError::MissingSubject);
    }

    #[test]
    fn search_only_applies_to_subjects() {
        let err = AppConfig::parse(argv(&["logout", "--search", "x"]), no_env).unwrap_err();
        assert_eq!(err, ArgsError::UnknownArg("--search".into()));
    }

    #[test]
    fn zero_seconds_is_invalid() {
        let err =
            AppConfig::parse(argv(&["subjects", "--seconds-per-question", "0"]), no_env)
                .unwrap_err();
        assert!(matches!(err, ArgsError::InvalidSeconds { .. }));
    }

    #[test]
    fn help_is_recognized_anywhere() {
        assert!(matches!(
            AppConfig::parse(argv(&["-h"]), no_env).unwrap(),
            Parsed::Help
        ));
        assert!(matches!(
            AppConfig::parse(argv(&["subjects", "--help"]), no_env).unwrap(),
            Parsed::Help
        ));
    }

    #[test]
    fn relative_db_path_becomes_absolute_url() {
        let url = normalize_sqlite_url("sqlite:data/quiz.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.db"));
    }
}

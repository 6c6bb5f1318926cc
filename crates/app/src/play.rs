use std::sync::Arc;

use quiz_core::model::score::format_clock;
use quiz_core::model::{Question, SubjectId, TimePressure};
use services::{EnterOutcome, LeaderboardStandings, QuizTimer, SessionEvent, SharedController};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Notify;

pub type Input = Lines<BufReader<Stdin>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Select(usize),
    Next,
    Previous,
    Hint,
    Finish,
    Quit,
}

fn parse_action(line: &str) -> Option<Action> {
    let line = line.trim().to_ascii_lowercase();
    match line.as_str() {
        "n" | "next" => Some(Action::Next),
        "p" | "prev" | "previous" => Some(Action::Previous),
        "h" | "hint" => Some(Action::Hint),
        "f" | "finish" | "submit" => Some(Action::Finish),
        "q" | "quit" => Some(Action::Quit),
        other => parse_option(other).map(Action::Select),
    }
}

/// `1`-based digits or option letters.
fn parse_option(raw: &str) -> Option<usize> {
    if let Ok(n) = raw.parse::<usize>() {
        return n.checked_sub(1);
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ 'a'..='z'), None) => Some(usize::from(c as u8 - b'a')),
        _ => None,
    }
}

async fn read_line(input: &mut Input) -> Result<Option<String>, std::io::Error> {
    input.next_line().await
}

/// Ask for a player name until a valid one is given. `false` on end of input.
pub async fn prompt_player(
    controller: &SharedController,
    input: &mut Input,
) -> Result<bool, Box<dyn std::error::Error>> {
    loop {
        println!("What's your name?");
        let Some(line) = read_line(input).await? else {
            return Ok(false);
        };
        match controller.lock().await.save_player_name(&line).await {
            Ok(player) => {
                println!("Welcome, {player}!");
                return Ok(true);
            }
            Err(err) => println!("{err}"),
        }
    }
}

/// Run one interactive attempt for `subject`.
pub async fn run(
    controller: SharedController,
    subject: &SubjectId,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = controller.lock().await.enter_subject(subject).await?;
    match outcome {
        EnterOutcome::Resumed => println!("Resuming your quiz."),
        EnterOutcome::Started => println!("Starting a new quiz."),
        EnterOutcome::Restarted => println!("Your last attempt was finished; starting over."),
    }
    println!("Answer with a number or letter. n: next, p: previous, h: hint, f: finish, q: quit");

    let finished = Arc::new(Notify::new());
    let signal = Arc::clone(&finished);
    let subscription = controller.lock().await.subscribe(move |event| {
        if matches!(event, SessionEvent::Completed { .. }) {
            signal.notify_one();
        }
    });
    let timer = QuizTimer::start(SharedController::clone(&controller)).await;

    let quit = loop {
        render(&controller).await;
        let line = tokio::select! {
            line = read_line(input) => line?,
            () = finished.notified() => {
                println!("Time's up!");
                break false;
            }
        };
        let Some(line) = line else {
            break true;
        };
        let Some(action) = parse_action(&line) else {
            println!("Unrecognized input: {}", line.trim());
            continue;
        };

        let mut c = controller.lock().await;
        if c.session().is_some_and(|s| s.is_complete()) {
            break false;
        }
        match action {
            Action::Select(option) => {
                if let Err(err) = c.select_answer(option).await {
                    println!("{err}");
                }
            }
            Action::Next => {
                if !c.next_question().await? {
                    println!("This is the last question. Enter f to finish.");
                }
            }
            Action::Previous => {
                if !c.previous_question().await? {
                    println!("Already at the first question.");
                }
            }
            Action::Hint => {
                if let Some(session) = c.session() {
                    println!("Hint: {}", session.current_question().hint());
                }
            }
            Action::Finish => {
                c.complete_quiz().await?;
                break false;
            }
            Action::Quit => break true,
        }
    };

    subscription.unsubscribe();
    timer.stop().await?;
    if quit {
        println!("Progress saved. Run play again to resume.");
        return Ok(());
    }

    show_results(&controller).await
}

async fn render(controller: &SharedController) {
    let c = controller.lock().await;
    let Some(session) = c.session() else {
        return;
    };
    let progress = session.progress();
    let marker = match progress.time_pressure {
        TimePressure::Normal => "",
        TimePressure::Warning => " (hurry)",
        TimePressure::Critical => " (almost out of time!)",
    };
    println!();
    println!(
        "Question {}/{}  answered {}  time {}{marker}",
        progress.position,
        progress.total,
        progress.answered,
        format_clock(progress.time_left_secs)
    );
    let question = session.current_question();
    println!("{}", question.prompt());
    for (i, option) in question.options().iter().enumerate() {
        let label = Question::option_label(i).unwrap_or('?');
        let selected = if session.current_answer() == Some(i) {
            '*'
        } else {
            ' '
        };
        println!(" {selected}{label}) {option}");
    }
}

async fn show_results(controller: &SharedController) -> Result<(), Box<dyn std::error::Error>> {
    let c = controller.lock().await;
    let standings = c.standings().await?;

    println!();
    println!(
        "Score: {}/{}  ({}%)",
        standings.score, standings.question_count, standings.accuracy_percent
    );
    println!("{}", standings.band.message());

    for (i, item) in c.review()?.iter().enumerate() {
        let verdict = if item.is_correct { "correct" } else { "wrong" };
        let correct = Question::option_label(item.correct).unwrap_or('?');
        println!("{}. {} [{verdict}, answer {correct}]", i + 1, item.prompt);
        if let Some(explanation) = &item.explanation {
            println!("   {explanation}");
        }
    }

    print_standings(&standings);
    Ok(())
}

fn print_standings(standings: &LeaderboardStandings) {
    println!();
    println!("Leaderboard");
    for row in &standings.rows {
        let you = if row.is_current_player { "  <- you" } else { "" };
        println!(
            "{:>3}. {:<20} {:>3}  {:>3}%{you}",
            row.rank,
            row.player.as_str(),
            row.score,
            row.accuracy_percent
        );
    }
    match standings.player_rank {
        Some(rank) if standings.player_outside_top() => {
            println!("You are ranked #{rank} of {}.", standings.total_entries);
        }
        _ => {}
    }
}

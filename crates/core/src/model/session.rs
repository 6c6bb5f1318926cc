use thiserror::Error;

use crate::model::ids::{PlayerName, SubjectId};
use crate::model::question::Question;
use crate::model::score::{TimePressure, accuracy_percent};

/// Default time budget granted per question.
pub const SECONDS_PER_QUESTION: u32 = 60;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a quiz needs at least one question")]
    NoQuestions,

    #[error("quiz already completed")]
    Completed,

    #[error("quiz has not been started")]
    NotStarted,

    #[error("option {option} is out of range for a question with {count} options")]
    OptionOutOfRange { option: usize, count: usize },
}

//
// ─── PROGRESS / REVIEW ─────────────────────────────────────────────────────────
//

/// Outcome of a single countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time remains; carries the seconds left after this tick.
    Running(u32),
    /// The budget is exhausted and the quiz must be completed.
    Expired,
}

/// Aggregated view of quiz progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    /// 1-based position of the current question.
    pub position: usize,
    pub total: usize,
    pub answered: usize,
    pub is_last: bool,
    pub time_left_secs: u32,
    pub time_pressure: TimePressure,
    pub is_complete: bool,
}

/// Per-question outcome shown after completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    pub correct: usize,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One quiz attempt by one player for one subject.
///
/// `answers` always has one slot per question. Once completed, the answers,
/// the current index and the remaining time are frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    subject_id: SubjectId,
    player: PlayerName,
    questions: Vec<Question>,
    current: usize,
    answers: Vec<Option<usize>>,
    time_left_secs: u32,
    time_budget_secs: u32,
    started: bool,
    completed: bool,
}

impl QuizSession {
    /// Start a fresh attempt with `seconds_per_question` of time per question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuestions` if `questions` is empty.
    pub fn start(
        subject_id: SubjectId,
        player: PlayerName,
        questions: Vec<Question>,
        seconds_per_question: u32,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        let count = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        let budget = count.saturating_mul(seconds_per_question);
        Ok(Self {
            subject_id,
            player,
            answers: vec![None; questions.len()],
            questions,
            current: 0,
            time_left_secs: budget,
            time_budget_secs: budget,
            started: true,
            completed: false,
        })
    }

    /// Rebuild a session from persisted parts. Callers validate invariants.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        subject_id: SubjectId,
        player: PlayerName,
        questions: Vec<Question>,
        current: usize,
        answers: Vec<Option<usize>>,
        time_left_secs: u32,
        time_budget_secs: u32,
        started: bool,
        completed: bool,
    ) -> Self {
        Self {
            subject_id,
            player,
            questions,
            current,
            answers,
            time_left_secs,
            time_budget_secs,
            started,
            completed,
        }
    }

    #[must_use]
    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    #[must_use]
    pub fn player(&self) -> &PlayerName {
        &self.player
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<usize> {
        self.answers[self.current]
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    #[must_use]
    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    #[must_use]
    pub fn time_budget_secs(&self) -> u32 {
        self.time_budget_secs
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// True while the countdown should be running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started && !self.completed
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    fn ensure_mutable(&self) -> Result<(), SessionError> {
        if self.completed {
            return Err(SessionError::Completed);
        }
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        Ok(())
    }

    /// Record `option` for the current question, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` on a finished quiz and
    /// `SessionError::OptionOutOfRange` if `option` is not a valid position.
    pub fn select_answer(&mut self, option: usize) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        let count = self.current_question().option_count();
        if option >= count {
            return Err(SessionError::OptionOutOfRange { option, count });
        }
        self.answers[self.current] = Some(option);
        Ok(())
    }

    /// Advance to the next question.
    ///
    /// Returns `false` without moving when already on the last question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` on a finished quiz.
    pub fn next_question(&mut self) -> Result<bool, SessionError> {
        self.ensure_mutable()?;
        if self.is_last_question() {
            return Ok(false);
        }
        self.current += 1;
        Ok(true)
    }

    /// Step back one question. Returns `false` at the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` on a finished quiz.
    pub fn previous_question(&mut self) -> Result<bool, SessionError> {
        self.ensure_mutable()?;
        if self.current == 0 {
            return Ok(false);
        }
        self.current -= 1;
        Ok(true)
    }

    /// Consume one second of the budget.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once the quiz is finished, so a
    /// stray tick can never touch a frozen session.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        self.ensure_mutable()?;
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if self.time_left_secs == 0 {
            Ok(TickOutcome::Expired)
        } else {
            Ok(TickOutcome::Running(self.time_left_secs))
        }
    }

    /// Mark the quiz completed. Returns `true` only on the transition.
    pub fn complete(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.started = true;
        self.completed = true;
        true
    }

    /// Number of answers matching the answer key. Unanswered slots never count.
    #[must_use]
    pub fn score(&self) -> u32 {
        let correct = self
            .questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| a.is_some_and(|a| q.is_correct(a)))
            .count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        accuracy_percent(self.score(), self.questions.len())
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    #[must_use]
    pub fn time_pressure(&self) -> TimePressure {
        TimePressure::from_remaining(self.time_left_secs, self.time_budget_secs)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            position: self.current + 1,
            total: self.questions.len(),
            answered: self.answered_count(),
            is_last: self.is_last_question(),
            time_left_secs: self.time_left_secs,
            time_pressure: self.time_pressure(),
            is_complete: self.completed,
        }
    }

    /// Per-question review of the attempt.
    #[must_use]
    pub fn review(&self) -> Vec<ReviewItem> {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(q, selected)| ReviewItem {
                prompt: q.prompt().to_string(),
                options: q.options().to_vec(),
                selected: *selected,
                correct: q.correct_option(),
                is_correct: selected.is_some_and(|a| q.is_correct(a)),
                explanation: q.explanation().map(str::to_string),
            })
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

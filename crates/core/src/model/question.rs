use serde::{Deserialize, Serialize};

/// Hint shown when a question carries no explanation of its own.
pub const DEFAULT_HINT: &str =
    "Think carefully about the question. Consider all options before selecting your answer.";

/// A single multiple-choice question.
///
/// Options are ordered; answers refer to them by position. Content is taken
/// as-is from the question bank and is never validated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "question")]
    prompt: String,
    options: Vec<String>,
    #[serde(alias = "correctAnswer", alias = "correct_answer")]
    correct_option: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

impl Question {
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option: usize,
        explanation: Option<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            correct_option,
            explanation,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Explanation if present, otherwise a generic hint.
    #[must_use]
    pub fn hint(&self) -> &str {
        self.explanation().unwrap_or(DEFAULT_HINT)
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option
    }

    /// Letter label for an option position (`0 -> 'A'`).
    #[must_use]
    pub fn option_label(index: usize) -> Option<char> {
        u8::try_from(index)
            .ok()
            .and_then(|i| b'A'.checked_add(i))
            .filter(u8::is_ascii_uppercase)
            .map(char::from)
    }
}

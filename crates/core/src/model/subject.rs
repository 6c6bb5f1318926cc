use serde::{Deserialize, Serialize};

use crate::model::ids::SubjectId;

/// Catalog entry for a subject, as listed by the subject catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub time_in_minutes: u32,
    pub question_count: u32,
}

impl Subject {
    /// Case-insensitive substring match on the subject name.
    ///
    /// An empty or blank query matches every subject.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Filters subjects by name, preserving catalog order.
#[must_use]
pub fn filter_subjects<'a>(subjects: &'a [Subject], query: &str) -> Vec<&'a Subject> {
    subjects.iter().filter(|s| s.matches_query(query)).collect()
}

use chrono::{DateTime, Utc};

use crate::model::ids::PlayerName;
use crate::model::score::accuracy_percent;

/// A recorded score submission for a subject.
///
/// `sequence` is assigned by the store in submission order and breaks ties
/// between equal scores (earlier submissions rank higher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub player: PlayerName,
    pub score: u32,
    pub submitted_at: DateTime<Utc>,
    pub sequence: u64,
}

impl LeaderboardEntry {
    #[must_use]
    pub fn accuracy_percent(&self, question_count: usize) -> u32 {
        accuracy_percent(self.score, question_count)
    }
}

/// Sort entries by score descending, ties by submission order.
///
/// The ordering is total, so the result is deterministic regardless of the
/// order entries were read back from storage.
pub fn rank_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}

/// 1-based position of the player's best (first) entry in ranked order.
#[must_use]
pub fn rank_of(ranked: &[LeaderboardEntry], player: &PlayerName) -> Option<usize> {
    ranked
        .iter()
        .position(|e| &e.player == player)
        .map(|i| i + 1)
}

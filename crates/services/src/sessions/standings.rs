use quiz_core::model::{LeaderboardEntry, PlayerName, ScoreBand, accuracy_percent, rank_of};

/// Rows shown on the results screen.
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingRow {
    /// 1-based.
    pub rank: usize,
    pub player: PlayerName,
    pub score: u32,
    pub accuracy_percent: u32,
    pub is_current_player: bool,
}

/// Results-screen view of a subject leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardStandings {
    pub rows: Vec<StandingRow>,
    /// Rank of the player's best entry across the full board, not only the top rows.
    pub player_rank: Option<usize>,
    pub total_entries: usize,
    pub score: u32,
    pub question_count: usize,
    pub accuracy_percent: u32,
    pub band: ScoreBand,
}

impl LeaderboardStandings {
    /// Build from entries already in ranked order.
    #[must_use]
    pub fn build(
        ranked: Vec<LeaderboardEntry>,
        player: &PlayerName,
        score: u32,
        question_count: usize,
    ) -> Self {
        let accuracy = accuracy_percent(score, question_count);
        let player_rank = rank_of(&ranked, player);
        let total_entries = ranked.len();
        let rows = ranked
            .into_iter()
            .take(TOP_N)
            .enumerate()
            .map(|(i, entry)| StandingRow {
                rank: i + 1,
                is_current_player: &entry.player == player,
                accuracy_percent: entry.accuracy_percent(question_count),
                player: entry.player,
                score: entry.score,
            })
            .collect();

        Self {
            rows,
            player_rank,
            total_entries,
            score,
            question_count,
            accuracy_percent: accuracy,
            band: ScoreBand::from_accuracy(accuracy),
        }
    }

    /// True when the player's rank falls outside the listed rows.
    #[must_use]
    pub fn player_outside_top(&self) -> bool {
        self.player_rank.is_some_and(|rank| rank > self.rows.len())
    }
}

mod ids;
mod leaderboard;
mod question;
pub mod score;
mod session;
mod snapshot;
mod subject;

pub use ids::{PlayerName, PlayerNameError, SubjectId};
pub use leaderboard::{LeaderboardEntry, rank_entries, rank_of};
pub use question::{DEFAULT_HINT, Question};
pub use score::{ScoreBand, TimePressure, accuracy_percent};
pub use session::{
    QuizSession, ReviewItem, SECONDS_PER_QUESTION, SessionError, SessionProgress, TickOutcome,
};
pub use snapshot::{SNAPSHOT_SCHEMA_VERSION, SessionSnapshot, SnapshotError};
pub use subject::{Subject, filter_subjects};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{LeaderboardEntry, PlayerName, SubjectId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, player_from_str, ser, u32_from_i64};
use crate::repository::{LeaderboardRepository, StorageError};

fn sequence_from_rowid(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid entry id: {v}")))
}

fn map_entry_row(row: &sqlx::sqlite::SqliteRow) -> Result<LeaderboardEntry, StorageError> {
    Ok(LeaderboardEntry {
        player: player_from_str(row.try_get("player_name").map_err(ser)?)?,
        score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        sequence: sequence_from_rowid(row.try_get::<i64, _>("id").map_err(ser)?)?,
    })
}

#[async_trait]
impl LeaderboardRepository for SqliteRepository {
    async fn submit_score(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
        score: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<LeaderboardEntry, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO leaderboard_entries (subject_id, player_name, score, submitted_at)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(subject_id.as_str())
        .bind(player.as_str())
        .bind(i64::from(score))
        .bind(submitted_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(LeaderboardEntry {
            player: player.clone(),
            score,
            submitted_at,
            sequence: sequence_from_rowid(res.last_insert_rowid())?,
        })
    }

    async fn list_entries(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, player_name, score, submitted_at
                FROM leaderboard_entries
                WHERE subject_id = ?1
                ORDER BY score DESC, id ASC
            ",
        )
        .bind(subject_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_entry_row).collect()
    }
}

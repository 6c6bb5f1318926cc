use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{PlayerName, SessionSnapshot, SubjectId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{SnapshotStore, StorageError};

#[async_trait]
impl SnapshotStore for SqliteRepository {
    async fn get_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT payload
                FROM session_snapshots
                WHERE subject_id = ?1 AND player_name = ?2
            ",
        )
        .bind(subject_id.as_str())
        .bind(player.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload").map_err(ser)?;
        SessionSnapshot::from_json(&payload).map(Some).map_err(ser)
    }

    async fn put_snapshot(
        &self,
        snapshot: &SessionSnapshot,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let payload = snapshot.to_json().map_err(ser)?;
        sqlx::query(
            r"
                INSERT INTO session_snapshots (subject_id, player_name, payload, saved_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(subject_id, player_name) DO UPDATE SET
                    payload = excluded.payload,
                    saved_at = excluded.saved_at
            ",
        )
        .bind(snapshot.subject_id.as_str())
        .bind(snapshot.player_name.as_str())
        .bind(payload)
        .bind(saved_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn delete_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_snapshots WHERE subject_id = ?1 AND player_name = ?2")
            .bind(subject_id.as_str())
            .bind(player.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn delete_all_snapshots(&self, player: &PlayerName) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM session_snapshots WHERE player_name = ?1")
            .bind(player.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }
}

use async_trait::async_trait;
use quiz_core::model::PlayerName;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, player_from_str, ser};
use crate::repository::{PlayerRepository, StorageError};

#[async_trait]
impl PlayerRepository for SqliteRepository {
    async fn load_player(&self) -> Result<Option<PlayerName>, StorageError> {
        let row = sqlx::query("SELECT player_name FROM player_profile WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("player_name").map_err(ser)?;
        player_from_str(raw).map(Some)
    }

    async fn save_player(&self, player: &PlayerName) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO player_profile (id, player_name)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                player_name = excluded.player_name
            ",
        )
        .bind(1_i64)
        .bind(player.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_player(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM player_profile WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}

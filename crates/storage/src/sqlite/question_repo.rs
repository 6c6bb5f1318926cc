use async_trait::async_trait;
use quiz_core::model::{Question, Subject, SubjectId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_question_row, ser, u32_from_i64, usize_to_i64};
use crate::repository::{QuestionBank, StorageError};

impl SqliteRepository {
    /// Insert or update a catalog subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the write fails.
    pub async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO subjects (id, name, time_in_minutes, question_count)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    time_in_minutes = excluded.time_in_minutes,
                    question_count = excluded.question_count
            ",
        )
        .bind(subject.id.as_str())
        .bind(&subject.name)
        .bind(i64::from(subject.time_in_minutes))
        .bind(i64::from(subject.question_count))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    /// Replace all questions of a subject in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or any write fails.
    pub async fn replace_questions(
        &self,
        subject_id: &SubjectId,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM questions WHERE subject_id = ?1")
            .bind(subject_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in questions.iter().enumerate() {
            let options = serde_json::to_string(question.options()).map_err(ser)?;
            sqlx::query(
                r"
                    INSERT INTO questions (
                        subject_id, position, prompt, options, correct_option, explanation
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(subject_id.as_str())
            .bind(usize_to_i64("position", position)?)
            .bind(question.prompt())
            .bind(options)
            .bind(usize_to_i64("correct_option", question.correct_option())?)
            .bind(question.explanation())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for SqliteRepository {
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, name, time_in_minutes, question_count
                FROM subjects
                ORDER BY rowid ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Subject {
                id: SubjectId::new(row.try_get::<String, _>("id").map_err(ser)?),
                name: row.try_get("name").map_err(ser)?,
                time_in_minutes: u32_from_i64(
                    "time_in_minutes",
                    row.try_get::<i64, _>("time_in_minutes").map_err(ser)?,
                )?,
                question_count: u32_from_i64(
                    "question_count",
                    row.try_get::<i64, _>("question_count").map_err(ser)?,
                )?,
            });
        }
        Ok(out)
    }

    async fn get_questions(&self, subject_id: &SubjectId) -> Result<Vec<Question>, StorageError> {
        let known = sqlx::query("SELECT 1 FROM subjects WHERE id = ?1")
            .bind(subject_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if known.is_none() {
            return Err(StorageError::NotFound);
        }

        let rows = sqlx::query(
            r"
                SELECT prompt, options, correct_option, explanation
                FROM questions
                WHERE subject_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(subject_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}

// src/store/pg.rs

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{
        answer::{AnswerCounts, AnswerRecord},
        question::Question,
        session::{SelectionMode, TestSession},
    },
    store::{NewAnswer, NewSession, PracticeStore},
};

const QUESTION_COLUMNS: &str =
    "q.id, q.subject_id, q.content, q.choices, q.correct_choice, q.analysis, q.approved, q.created_at";

const SESSION_COLUMNS: &str = "id, user_id, tutor, timed, selection_mode, requested_count, \
     subject_ids, question_ids, current_index, score, answered_count, \
     remaining_seconds, completed, created_at";

/// Postgres-backed implementation of [`PracticeStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PracticeStore for PgStore {
    async fn fetch_questions(
        &self,
        subject_ids: &[i64],
        limit: i64,
        mode: SelectionMode,
        user_id: i64,
    ) -> Result<Vec<Question>, AppError> {
        let base = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions q \
             WHERE q.approved = TRUE \
               AND (cardinality($1::BIGINT[]) = 0 OR q.subject_id = ANY($1))"
        );

        // Random sampling relies on the database: ORDER BY RANDOM() gives
        // an unbiased sample without replacement within one fetch.
        let query = match mode {
            SelectionMode::All => {
                let sql = format!("{base} ORDER BY RANDOM() LIMIT $2");
                sqlx::query_as::<_, Question>(&sql)
                    .bind(subject_ids.to_vec())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            SelectionMode::Unused => {
                let sql = format!(
                    "{base} AND NOT EXISTS (SELECT 1 FROM answers a \
                       WHERE a.question_id = q.id AND a.user_id = $2) \
                     ORDER BY RANDOM() LIMIT $3"
                );
                sqlx::query_as::<_, Question>(&sql)
                    .bind(subject_ids.to_vec())
                    .bind(user_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            SelectionMode::Incorrect => {
                let sql = format!(
                    "{base} AND EXISTS (SELECT 1 FROM answers a \
                       WHERE a.question_id = q.id AND a.user_id = $2 \
                         AND a.is_correct = FALSE) \
                     ORDER BY RANDOM() LIMIT $3"
                );
                sqlx::query_as::<_, Question>(&sql)
                    .bind(subject_ids.to_vec())
                    .bind(user_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        };

        query.map_err(|e| {
            tracing::error!("Failed to fetch questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })
    }

    async fn load_questions(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions q WHERE q.id = ANY($1)");
        let rows = sqlx::query_as::<_, Question>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        // ANY() loses the draw order; restore it from the id list.
        let mut by_id: HashMap<i64, Question> =
            rows.into_iter().map(|q| (q.id, q)).collect();

        ids.iter()
            .map(|id| {
                by_id
                    .remove(id)
                    .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))
            })
            .collect()
    }

    async fn replace_incomplete_session(&self, new: &NewSession) -> Result<i64, AppError> {
        // Delete-then-insert in one transaction so two concurrent starts
        // cannot leave two incomplete sessions behind.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM test_sessions WHERE user_id = $1 AND completed = FALSE")
            .bind(new.user_id)
            .execute(&mut *tx)
            .await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO test_sessions \
             (user_id, tutor, timed, selection_mode, requested_count, \
              subject_ids, question_ids, remaining_seconds) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(new.user_id)
        .bind(new.tutor)
        .bind(new.timed)
        .bind(new.selection_mode.as_str())
        .bind(new.requested_count)
        .bind(Json(new.subject_ids.clone()))
        .bind(Json(new.question_ids.clone()))
        .bind(new.remaining_seconds)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create test session: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        tx.commit().await?;

        Ok(id)
    }

    async fn find_incomplete_session(
        &self,
        user_id: i64,
    ) -> Result<Option<TestSession>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM test_sessions \
             WHERE user_id = $1 AND completed = FALSE \
             ORDER BY created_at DESC LIMIT 1"
        );
        let session = sqlx::query_as::<_, TestSession>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    async fn session_answers(&self, session_id: i64) -> Result<Vec<AnswerRecord>, AppError> {
        let answers = sqlx::query_as::<_, AnswerRecord>(
            "SELECT id, user_id, question_id, session_id, selected_choice, is_correct, created_at \
             FROM answers WHERE session_id = $1 ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(answers)
    }

    async fn record_answer(&self, new: &NewAnswer) -> Result<(), AppError> {
        // The answer row and the session counters commit together; a
        // failure rolls both back so the score can never drift from the
        // persisted answer records.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO answers (user_id, question_id, session_id, selected_choice, is_correct) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(new.user_id)
        .bind(new.question_id)
        .bind(new.session_id)
        .bind(new.selected_choice)
        .bind(new.is_correct)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE test_sessions \
             SET score = score + CASE WHEN $2 THEN 1 ELSE 0 END, \
                 answered_count = answered_count + 1 \
             WHERE id = $1",
        )
        .bind(new.session_id)
        .bind(new.is_correct)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Test session not found".to_string()));
        }

        tx.commit().await?;

        Ok(())
    }

    async fn save_progress(
        &self,
        session_id: i64,
        current_index: i32,
        remaining_seconds: Option<i32>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE test_sessions SET current_index = $2, remaining_seconds = $3 WHERE id = $1",
        )
        .bind(session_id)
        .bind(current_index)
        .bind(remaining_seconds)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Test session not found".to_string()));
        }

        Ok(())
    }

    async fn complete_session(&self, session_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE test_sessions SET completed = TRUE WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Test session not found".to_string()));
        }

        Ok(())
    }

    async fn delete_session(&self, user_id: i64, session_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM test_sessions WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Test session not found".to_string()));
        }

        Ok(())
    }

    async fn answer_counts(&self, user_id: i64) -> Result<AnswerCounts, AppError> {
        let counts = sqlx::query_as::<_, AnswerCounts>(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE is_correct) AS correct \
             FROM answers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read answer counts: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(counts)
    }
}

// src/models/answer.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Represents the 'answers' table in the database.
/// One user's response to one question within one test session.
/// Created exactly once, never mutated; `is_correct` is frozen at
/// submission time even if the question is edited later.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub session_id: i64,
    /// 1-based index of the chosen option.
    pub selected_choice: i16,
    pub is_correct: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lifetime answer totals for one user, feeding the pass-probability
/// estimator.
#[derive(Debug, Clone, Copy, Default, FromRow, Serialize)]
pub struct AnswerCounts {
    pub total: i64,
    pub correct: i64,
}

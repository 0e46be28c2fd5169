// src/models/session.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::error::AppError;

/// Policy governing which bank questions are eligible for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Any approved question in the chosen subjects.
    All,
    /// Only questions the user has never answered, in any session.
    Unused,
    /// Only questions the user has previously answered incorrectly.
    Incorrect,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::All => "all",
            SelectionMode::Unused => "unused",
            SelectionMode::Incorrect => "incorrect",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "all" => Ok(SelectionMode::All),
            "unused" => Ok(SelectionMode::Unused),
            "incorrect" => Ok(SelectionMode::Incorrect),
            other => Err(AppError::BadRequest(format!(
                "Unknown selection mode '{}'",
                other
            ))),
        }
    }
}

/// Strongly typed session configuration, validated once at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Empty means all subjects.
    pub subject_ids: Vec<i64>,
    pub question_count: u32,
    pub selection_mode: SelectionMode,
    pub tutor: bool,
    pub timed: bool,
}

/// DTO for starting a practice test.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub subject_ids: Vec<i64>,
    #[validate(range(min = 1, max = 240))]
    pub question_count: u32,
    pub selection_mode: SelectionMode,
    #[serde(default)]
    pub tutor: bool,
    #[serde(default)]
    pub timed: bool,
}

impl From<StartSessionRequest> for SessionConfig {
    fn from(req: StartSessionRequest) -> Self {
        SessionConfig {
            subject_ids: req.subject_ids,
            question_count: req.question_count,
            selection_mode: req.selection_mode,
            tutor: req.tutor,
            timed: req.timed,
        }
    }
}

/// Represents the 'test_sessions' table in the database.
/// One row per practice run; at most one incomplete row per user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestSession {
    pub id: i64,
    pub user_id: i64,
    pub tutor: bool,
    pub timed: bool,
    /// Stored as text; parse with `SelectionMode::from_str`.
    pub selection_mode: String,
    pub requested_count: i32,
    pub subject_ids: Json<Vec<i64>>,
    /// The drawn question set in presentation order, for resume.
    pub question_ids: Json<Vec<i64>>,
    pub current_index: i32,
    pub score: i32,
    pub answered_count: i32,
    /// Persisted countdown for timed sessions; `None` when untimed.
    pub remaining_seconds: Option<i32>,
    pub completed: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for submitting an answer to the current question.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(range(min = 1, max = 4))]
    pub selected_choice: i16,
}

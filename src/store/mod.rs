// src/store/mod.rs

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        answer::{AnswerCounts, AnswerRecord},
        question::Question,
        session::{SelectionMode, TestSession},
    },
};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Parameters for creating a new test session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub tutor: bool,
    pub timed: bool,
    pub selection_mode: SelectionMode,
    pub requested_count: i32,
    pub subject_ids: Vec<i64>,
    /// The drawn question set, in presentation order.
    pub question_ids: Vec<i64>,
    pub remaining_seconds: Option<i32>,
}

/// Parameters for recording one answer submission.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub user_id: i64,
    pub question_id: i64,
    pub session_id: i64,
    pub selected_choice: i16,
    pub is_correct: bool,
}

/// Storage boundary consumed by the session state machine and the
/// pass-probability estimator. The production implementation is
/// [`PgStore`]; [`MemoryStore`] backs tests and embedders that want the
/// core logic without a database.
#[async_trait]
pub trait PracticeStore: Send + Sync {
    /// Draws an unbiased random sample (without replacement) of approved
    /// questions under the selection policy. An empty `subject_ids`
    /// filter means all subjects. May return fewer questions than
    /// `limit` when the eligible pool is smaller; callers must cope.
    async fn fetch_questions(
        &self,
        subject_ids: &[i64],
        limit: i64,
        mode: SelectionMode,
        user_id: i64,
    ) -> Result<Vec<Question>, AppError>;

    /// Resolves a previously drawn question set, preserving the order of
    /// `ids`. Errors if any id no longer exists.
    async fn load_questions(&self, ids: &[i64]) -> Result<Vec<Question>, AppError>;

    /// Deletes any incomplete sessions for the user and inserts the new
    /// row, in a single transaction, enforcing the at-most-one-incomplete-
    /// session invariant. Returns the new session id.
    async fn replace_incomplete_session(&self, new: &NewSession) -> Result<i64, AppError>;

    async fn find_incomplete_session(
        &self,
        user_id: i64,
    ) -> Result<Option<TestSession>, AppError>;

    /// All answers recorded against one session, oldest first.
    async fn session_answers(&self, session_id: i64) -> Result<Vec<AnswerRecord>, AppError>;

    /// Inserts the answer record and updates the session's score and
    /// answered count as one transaction, so the persisted counters can
    /// never diverge from the answer rows.
    async fn record_answer(&self, new: &NewAnswer) -> Result<(), AppError>;

    /// Persists navigation and countdown state for resume.
    async fn save_progress(
        &self,
        session_id: i64,
        current_index: i32,
        remaining_seconds: Option<i32>,
    ) -> Result<(), AppError>;

    /// Marks the session complete. The flag is monotonic; completing an
    /// already-complete session is a no-op.
    async fn complete_session(&self, session_id: i64) -> Result<(), AppError>;

    /// Explicit user deletion of a session; answer rows cascade.
    async fn delete_session(&self, user_id: i64, session_id: i64) -> Result<(), AppError>;

    /// Lifetime answer totals for one user.
    async fn answer_counts(&self, user_id: i64) -> Result<AnswerCounts, AppError>;
}

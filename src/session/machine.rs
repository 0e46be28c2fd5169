// src/session/machine.rs
//
// Practice-test session state machine. One instance tracks one user's
// run through a drawn question set: NotStarted -> InProgress (via
// `start` or `resume`) -> Complete. Tutor and timed are presentation
// sub-modes and do not change the transition rules.

use serde::Serialize;
use std::fmt;

use crate::{
    error::AppError,
    models::{
        question::{CHOICE_COUNT, PublicQuestion, Question},
        session::{SelectionMode, SessionConfig, TestSession},
    },
    session::timer::{Countdown, Tick},
    store::{NewAnswer, NewSession, PracticeStore},
};

/// State-machine rule violations. Store failures surface separately as
/// [`AppError`] and are the caller's decision to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The selection policy yielded an empty question set.
    NoQuestionsAvailable,
    /// The current question already has a recorded answer.
    AlreadyAnswered,
    /// Cannot advance past an unanswered question.
    NotYetAnswered,
    /// Already at the first question.
    AtFirstQuestion,
    /// Already at the last question; completion is an explicit call.
    AtLastQuestion,
    /// The session has been completed; no further answers are accepted.
    SessionComplete,
    /// Selected choice index outside 1..=4.
    InvalidChoice(i16),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoQuestionsAvailable => {
                write!(f, "No questions available for the selected criteria")
            }
            SessionError::AlreadyAnswered => {
                write!(f, "Answer already recorded for this question")
            }
            SessionError::NotYetAnswered => {
                write!(f, "Current question has not been answered yet")
            }
            SessionError::AtFirstQuestion => write!(f, "Already at the first question"),
            SessionError::AtLastQuestion => write!(f, "Already at the last question"),
            SessionError::SessionComplete => write!(f, "Session is already complete"),
            SessionError::InvalidChoice(choice) => {
                write!(f, "Selected choice {} is out of range", choice)
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoQuestionsAvailable => AppError::NotFound(err.to_string()),
            SessionError::AlreadyAnswered | SessionError::SessionComplete => {
                AppError::Conflict(err.to_string())
            }
            SessionError::NotYetAnswered
            | SessionError::AtFirstQuestion
            | SessionError::AtLastQuestion
            | SessionError::InvalidChoice(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

/// What the client learns after submitting an answer. Correctness and
/// the explanation are revealed immediately only in tutor mode.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub question_id: i64,
    pub correct: Option<bool>,
    pub correct_choice: Option<i16>,
    pub analysis: Option<String>,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "remaining_seconds")]
pub enum TimerStatus {
    Untimed,
    Running(u32),
    Expired,
}

/// Snapshot of the session for the client.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: i64,
    pub question_index: usize,
    pub total_questions: usize,
    pub score: u32,
    pub answered_count: u32,
    pub completed: bool,
    pub tutor: bool,
    pub timed: bool,
    pub remaining_seconds: Option<u32>,
    /// Whether the current question already has a recorded answer.
    pub answered: bool,
    pub question: Option<PublicQuestion>,
}

/// Final results reported on completion.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub score: u32,
    pub answered_count: u32,
    pub total_questions: usize,
}

/// One user's in-progress practice test.
///
/// In-memory counters move only after the store confirms the matching
/// write, so `score <= answered_count <= questions.len()` holds at every
/// point regardless of where a storage failure interrupts the flow.
pub struct PracticeSession {
    session_id: i64,
    user_id: i64,
    config: SessionConfig,
    questions: Vec<Question>,
    answered: Vec<bool>,
    index: usize,
    score: u32,
    answered_count: u32,
    countdown: Option<Countdown>,
    completed: bool,
}

impl PracticeSession {
    /// Starts a new session: draws the question set under the selection
    /// policy, replaces any incomplete session for the user (one
    /// transaction), and lands on question 0.
    ///
    /// A pool smaller than `config.question_count` silently produces a
    /// shorter test; an empty pool is the no-questions terminal error.
    pub async fn start(
        store: &dyn PracticeStore,
        user_id: i64,
        config: SessionConfig,
    ) -> Result<Self, AppError> {
        let questions = store
            .fetch_questions(
                &config.subject_ids,
                config.question_count as i64,
                config.selection_mode,
                user_id,
            )
            .await?;

        if questions.is_empty() {
            return Err(SessionError::NoQuestionsAvailable.into());
        }

        // The countdown budget follows the drawn set, not the request:
        // a shorter test gets a proportionally shorter clock.
        let countdown = config.timed.then(|| Countdown::new(questions.len() as u32));

        let session_id = store
            .replace_incomplete_session(&NewSession {
                user_id,
                tutor: config.tutor,
                timed: config.timed,
                selection_mode: config.selection_mode,
                requested_count: config.question_count as i32,
                subject_ids: config.subject_ids.clone(),
                question_ids: questions.iter().map(|q| q.id).collect(),
                remaining_seconds: countdown.map(|c| c.remaining() as i32),
            })
            .await?;

        tracing::info!(
            user_id,
            session_id,
            mode = config.selection_mode.as_str(),
            drawn = questions.len(),
            requested = config.question_count,
            "practice session started"
        );

        let answered = vec![false; questions.len()];
        Ok(Self {
            session_id,
            user_id,
            config,
            questions,
            answered,
            index: 0,
            score: 0,
            answered_count: 0,
            countdown,
            completed: false,
        })
    }

    /// Re-attaches to the user's incomplete session, restoring the drawn
    /// question order, answered flags, navigation position and the
    /// persisted countdown (restored, never reset).
    pub async fn resume(
        store: &dyn PracticeStore,
        user_id: i64,
    ) -> Result<Option<Self>, AppError> {
        let Some(row) = store.find_incomplete_session(user_id).await? else {
            return Ok(None);
        };

        let questions = store.load_questions(&row.question_ids.0).await?;
        let answers = store.session_answers(row.id).await?;

        let answered: Vec<bool> = row
            .question_ids
            .0
            .iter()
            .map(|qid| answers.iter().any(|a| a.question_id == *qid))
            .collect();

        let countdown = row
            .timed
            .then(|| Countdown::resume(row.remaining_seconds.unwrap_or(0).max(0) as u32));

        let index = (row.current_index.max(0) as usize).min(questions.len().saturating_sub(1));

        Ok(Some(Self {
            session_id: row.id,
            user_id,
            config: session_config_from_row(&row)?,
            questions,
            answered,
            index,
            score: row.score.max(0) as u32,
            answered_count: row.answered_count.max(0) as u32,
            countdown,
            completed: row.completed,
        }))
    }

    /// Records an answer for the current question. Valid only once per
    /// question; correctness is fixed against the stored answer key at
    /// submission time. The in-memory score moves only after the store
    /// has committed the answer row and counters together.
    pub async fn submit_answer(
        &mut self,
        store: &dyn PracticeStore,
        selected_choice: i16,
    ) -> Result<AnswerOutcome, AppError> {
        if self.completed {
            return Err(SessionError::SessionComplete.into());
        }
        if !(1..=CHOICE_COUNT).contains(&selected_choice) {
            return Err(SessionError::InvalidChoice(selected_choice).into());
        }
        if self.answered[self.index] {
            return Err(SessionError::AlreadyAnswered.into());
        }

        let question = &self.questions[self.index];
        let is_correct = selected_choice == question.correct_choice;

        store
            .record_answer(&NewAnswer {
                user_id: self.user_id,
                question_id: question.id,
                session_id: self.session_id,
                selected_choice,
                is_correct,
            })
            .await?;

        self.answered[self.index] = true;
        self.answered_count += 1;
        if is_correct {
            self.score += 1;
        }

        Ok(AnswerOutcome {
            question_id: question.id,
            correct: self.config.tutor.then_some(is_correct),
            correct_choice: self.config.tutor.then_some(question.correct_choice),
            analysis: if self.config.tutor {
                question.analysis.clone()
            } else {
                None
            },
        })
    }

    /// Moves to the next question. Requires the current question to be
    /// answered, except in review after completion. Stepping past the
    /// last question is rejected; finishing is an explicit `complete`.
    pub async fn advance(&mut self, store: &dyn PracticeStore) -> Result<(), AppError> {
        if !self.answered[self.index] && !self.completed {
            return Err(SessionError::NotYetAnswered.into());
        }
        if self.index + 1 >= self.questions.len() {
            return Err(SessionError::AtLastQuestion.into());
        }

        let new_index = self.index + 1;
        self.save_position(store, new_index).await?;
        self.index = new_index;
        Ok(())
    }

    /// Steps back for read-only review; the revisited question keeps its
    /// answered state and re-submission stays rejected.
    pub async fn go_back(&mut self, store: &dyn PracticeStore) -> Result<(), AppError> {
        if self.index == 0 {
            return Err(SessionError::AtFirstQuestion.into());
        }

        let new_index = self.index - 1;
        self.save_position(store, new_index).await?;
        self.index = new_index;
        Ok(())
    }

    /// Marks the session complete. Valid at any time and idempotent; the
    /// countdown stops with it.
    pub async fn complete(&mut self, store: &dyn PracticeStore) -> Result<SessionSummary, AppError> {
        if !self.completed {
            store.complete_session(self.session_id).await?;
            self.completed = true;
            tracing::info!(
                user_id = self.user_id,
                session_id = self.session_id,
                score = self.score,
                answered = self.answered_count,
                "practice session completed"
            );
        }
        Ok(self.summary())
    }

    /// Advances the countdown by one second, persisting the remaining
    /// value for resume. Expiry force-completes the session exactly
    /// once, regardless of the current question's answered state.
    pub async fn tick(&mut self, store: &dyn PracticeStore) -> Result<TimerStatus, AppError> {
        let Some(countdown) = self.countdown.as_mut() else {
            return Ok(TimerStatus::Untimed);
        };
        if self.completed {
            return Ok(TimerStatus::Expired);
        }

        match countdown.tick() {
            Tick::Running(remaining) => {
                store
                    .save_progress(self.session_id, self.index as i32, Some(remaining as i32))
                    .await?;
                Ok(TimerStatus::Running(remaining))
            }
            Tick::Expired => {
                store
                    .save_progress(self.session_id, self.index as i32, Some(0))
                    .await?;
                self.complete(store).await?;
                Ok(TimerStatus::Expired)
            }
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session_id,
            question_index: self.index,
            total_questions: self.questions.len(),
            score: self.score,
            answered_count: self.answered_count,
            completed: self.completed,
            tutor: self.config.tutor,
            timed: self.config.timed,
            remaining_seconds: self.countdown.map(|c| c.remaining()),
            answered: self.answered[self.index],
            question: self.questions.get(self.index).map(Question::to_public),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            score: self.score,
            answered_count: self.answered_count,
            total_questions: self.questions.len(),
        }
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    async fn save_position(
        &self,
        store: &dyn PracticeStore,
        new_index: usize,
    ) -> Result<(), AppError> {
        store
            .save_progress(
                self.session_id,
                new_index as i32,
                self.countdown.map(|c| c.remaining() as i32),
            )
            .await
    }
}

fn session_config_from_row(row: &TestSession) -> Result<SessionConfig, AppError> {
    Ok(SessionConfig {
        subject_ids: row.subject_ids.0.clone(),
        question_count: row.requested_count.max(0) as u32,
        selection_mode: SelectionMode::from_str(&row.selection_mode)?,
        tutor: row.tutor,
        timed: row.timed,
    })
}

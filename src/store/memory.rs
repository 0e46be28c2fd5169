// src/store/memory.rs

use async_trait::async_trait;
use rand::seq::SliceRandom;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    error::AppError,
    models::{
        answer::{AnswerCounts, AnswerRecord},
        question::Question,
        session::{SelectionMode, TestSession},
    },
    store::{NewAnswer, NewSession, PracticeStore},
};

/// In-memory implementation of [`PracticeStore`].
///
/// Backs the test suite and embedders that want the session machine and
/// estimator without a database. Mirrors the transactional semantics of
/// [`crate::store::PgStore`]: counters only move together with answer
/// rows, and replacing a session removes the old incomplete one first.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    questions: Vec<Question>,
    sessions: HashMap<i64, TestSession>,
    answers: Vec<AnswerRecord>,
    next_session_id: i64,
    next_answer_id: i64,
    complete_calls: HashMap<i64, u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an approved four-choice question into the bank.
    pub fn add_question(
        &self,
        id: i64,
        subject_id: i64,
        correct_choice: i16,
        analysis: Option<&str>,
    ) {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.questions.push(Question {
            id,
            subject_id,
            content: format!("Question {}", id),
            choices: Json(vec![
                "A".to_string(),
                "B".to_string(),
                "C".to_string(),
                "D".to_string(),
            ]),
            correct_choice,
            analysis: analysis.map(str::to_string),
            approved: true,
            created_at: Some(chrono::Utc::now()),
        });
    }

    /// Rewrites a question's answer key in place. Historical answers keep
    /// the correctness computed at submission time.
    pub fn edit_correct_choice(&self, question_id: i64, correct_choice: i16) {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        if let Some(q) = inner.questions.iter_mut().find(|q| q.id == question_id) {
            q.correct_choice = correct_choice;
        }
    }

    pub fn session(&self, session_id: i64) -> Option<TestSession> {
        let inner = self.inner.lock().expect("memory store poisoned");
        inner.sessions.get(&session_id).cloned()
    }

    pub fn incomplete_session_count(&self, user_id: i64) -> usize {
        let inner = self.inner.lock().expect("memory store poisoned");
        inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && !s.completed)
            .count()
    }

    /// How many times `complete_session` was invoked for a session.
    pub fn complete_calls(&self, session_id: i64) -> u32 {
        let inner = self.inner.lock().expect("memory store poisoned");
        inner.complete_calls.get(&session_id).copied().unwrap_or(0)
    }

    pub fn answer_records(&self, session_id: i64) -> Vec<AnswerRecord> {
        let inner = self.inner.lock().expect("memory store poisoned");
        inner
            .answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PracticeStore for MemoryStore {
    async fn fetch_questions(
        &self,
        subject_ids: &[i64],
        limit: i64,
        mode: SelectionMode,
        user_id: i64,
    ) -> Result<Vec<Question>, AppError> {
        let inner = self.inner.lock().expect("memory store poisoned");

        let mut eligible: Vec<Question> = inner
            .questions
            .iter()
            .filter(|q| q.approved)
            .filter(|q| subject_ids.is_empty() || subject_ids.contains(&q.subject_id))
            .filter(|q| match mode {
                SelectionMode::All => true,
                SelectionMode::Unused => !inner
                    .answers
                    .iter()
                    .any(|a| a.user_id == user_id && a.question_id == q.id),
                SelectionMode::Incorrect => inner
                    .answers
                    .iter()
                    .any(|a| a.user_id == user_id && a.question_id == q.id && !a.is_correct),
            })
            .cloned()
            .collect();

        eligible.shuffle(&mut rand::rng());
        eligible.truncate(limit.max(0) as usize);
        Ok(eligible)
    }

    async fn load_questions(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        ids.iter()
            .map(|id| {
                inner
                    .questions
                    .iter()
                    .find(|q| q.id == *id)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))
            })
            .collect()
    }

    async fn replace_incomplete_session(&self, new: &NewSession) -> Result<i64, AppError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");

        let stale: Vec<i64> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == new.user_id && !s.completed)
            .map(|s| s.id)
            .collect();
        for id in stale {
            inner.sessions.remove(&id);
            inner.answers.retain(|a| a.session_id != id);
        }

        inner.next_session_id += 1;
        let id = inner.next_session_id;
        inner.sessions.insert(
            id,
            TestSession {
                id,
                user_id: new.user_id,
                tutor: new.tutor,
                timed: new.timed,
                selection_mode: new.selection_mode.as_str().to_string(),
                requested_count: new.requested_count,
                subject_ids: Json(new.subject_ids.clone()),
                question_ids: Json(new.question_ids.clone()),
                current_index: 0,
                score: 0,
                answered_count: 0,
                remaining_seconds: new.remaining_seconds,
                completed: false,
                created_at: Some(chrono::Utc::now()),
            },
        );
        Ok(id)
    }

    async fn find_incomplete_session(
        &self,
        user_id: i64,
    ) -> Result<Option<TestSession>, AppError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && !s.completed)
            .max_by_key(|s| s.id)
            .cloned())
    }

    async fn session_answers(&self, session_id: i64) -> Result<Vec<AnswerRecord>, AppError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut answers: Vec<AnswerRecord> = inner
            .answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.id);
        Ok(answers)
    }

    async fn record_answer(&self, new: &NewAnswer) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");

        if !inner.sessions.contains_key(&new.session_id) {
            return Err(AppError::NotFound("Test session not found".to_string()));
        }

        inner.next_answer_id += 1;
        let id = inner.next_answer_id;
        inner.answers.push(AnswerRecord {
            id,
            user_id: new.user_id,
            question_id: new.question_id,
            session_id: new.session_id,
            selected_choice: new.selected_choice,
            is_correct: new.is_correct,
            created_at: Some(chrono::Utc::now()),
        });

        let session = inner
            .sessions
            .get_mut(&new.session_id)
            .expect("checked above");
        if new.is_correct {
            session.score += 1;
        }
        session.answered_count += 1;
        Ok(())
    }

    async fn save_progress(
        &self,
        session_id: i64,
        current_index: i32,
        remaining_seconds: Option<i32>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let session = inner
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound("Test session not found".to_string()))?;
        session.current_index = current_index;
        session.remaining_seconds = remaining_seconds;
        Ok(())
    }

    async fn complete_session(&self, session_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        *inner.complete_calls.entry(session_id).or_insert(0) += 1;
        let session = inner
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound("Test session not found".to_string()))?;
        session.completed = true;
        Ok(())
    }

    async fn delete_session(&self, user_id: i64, session_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let owned = inner
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.user_id == user_id);
        if !owned {
            return Err(AppError::NotFound("Test session not found".to_string()));
        }
        inner.sessions.remove(&session_id);
        inner.answers.retain(|a| a.session_id != session_id);
        Ok(())
    }

    async fn answer_counts(&self, user_id: i64) -> Result<AnswerCounts, AppError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let total = inner
            .answers
            .iter()
            .filter(|a| a.user_id == user_id)
            .count() as i64;
        let correct = inner
            .answers
            .iter()
            .filter(|a| a.user_id == user_id && a.is_correct)
            .count() as i64;
        Ok(AnswerCounts { total, correct })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for id in 1..=5 {
            store.add_question(id, 1, 1, None);
        }
        store
    }

    #[tokio::test]
    async fn unused_mode_excludes_answered_questions() {
        let store = seeded_store();
        let session_id = store
            .replace_incomplete_session(&NewSession {
                user_id: 7,
                tutor: false,
                timed: false,
                selection_mode: SelectionMode::All,
                requested_count: 3,
                subject_ids: vec![],
                question_ids: vec![1, 2, 3],
                remaining_seconds: None,
            })
            .await
            .unwrap();

        for question_id in [1, 2, 3] {
            store
                .record_answer(&NewAnswer {
                    user_id: 7,
                    question_id,
                    session_id,
                    selected_choice: 1,
                    is_correct: true,
                })
                .await
                .unwrap();
        }
        store.complete_session(session_id).await.unwrap();

        let fetched = store
            .fetch_questions(&[], 5, SelectionMode::Unused, 7)
            .await
            .unwrap();
        let mut ids: Vec<i64> = fetched.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![4, 5]);
    }

    #[tokio::test]
    async fn incorrect_mode_returns_only_missed_questions() {
        let store = seeded_store();
        let session_id = store
            .replace_incomplete_session(&NewSession {
                user_id: 7,
                tutor: false,
                timed: false,
                selection_mode: SelectionMode::All,
                requested_count: 2,
                subject_ids: vec![],
                question_ids: vec![1, 2],
                remaining_seconds: None,
            })
            .await
            .unwrap();

        store
            .record_answer(&NewAnswer {
                user_id: 7,
                question_id: 1,
                session_id,
                selected_choice: 1,
                is_correct: true,
            })
            .await
            .unwrap();
        store
            .record_answer(&NewAnswer {
                user_id: 7,
                question_id: 2,
                session_id,
                selected_choice: 3,
                is_correct: false,
            })
            .await
            .unwrap();
        store.complete_session(session_id).await.unwrap();

        let fetched = store
            .fetch_questions(&[], 5, SelectionMode::Incorrect, 7)
            .await
            .unwrap();
        let ids: Vec<i64> = fetched.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn smaller_pool_returns_all_eligible_silently() {
        let store = seeded_store();
        let fetched = store
            .fetch_questions(&[], 50, SelectionMode::All, 7)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 5);
    }

    #[tokio::test]
    async fn subject_filter_applies() {
        let store = seeded_store();
        store.add_question(6, 2, 1, None);
        let fetched = store
            .fetch_questions(&[2], 10, SelectionMode::All, 7)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, 6);
    }

    #[tokio::test]
    async fn replacing_session_cascades_answers() {
        let store = seeded_store();
        let new = NewSession {
            user_id: 7,
            tutor: false,
            timed: false,
            selection_mode: SelectionMode::All,
            requested_count: 1,
            subject_ids: vec![],
            question_ids: vec![1],
            remaining_seconds: None,
        };
        let first = store.replace_incomplete_session(&new).await.unwrap();
        store
            .record_answer(&NewAnswer {
                user_id: 7,
                question_id: 1,
                session_id: first,
                selected_choice: 1,
                is_correct: true,
            })
            .await
            .unwrap();

        let second = store.replace_incomplete_session(&new).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.incomplete_session_count(7), 1);
        assert!(store.answer_records(first).is_empty());
        assert_eq!(store.answer_counts(7).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn counters_track_answer_rows() {
        let store = seeded_store();
        let session_id = store
            .replace_incomplete_session(&NewSession {
                user_id: 9,
                tutor: false,
                timed: false,
                selection_mode: SelectionMode::All,
                requested_count: 2,
                subject_ids: vec![],
                question_ids: vec![1, 2],
                remaining_seconds: None,
            })
            .await
            .unwrap();

        store
            .record_answer(&NewAnswer {
                user_id: 9,
                question_id: 1,
                session_id,
                selected_choice: 1,
                is_correct: true,
            })
            .await
            .unwrap();
        store
            .record_answer(&NewAnswer {
                user_id: 9,
                question_id: 2,
                session_id,
                selected_choice: 2,
                is_correct: false,
            })
            .await
            .unwrap();

        let session = store.session(session_id).unwrap();
        assert_eq!(session.score, 1);
        assert_eq!(session.answered_count, 2);
        assert_eq!(store.answer_records(session_id).len(), 2);
    }
}

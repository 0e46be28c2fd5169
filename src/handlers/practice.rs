// src/handlers/practice.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::session::{SessionConfig, StartSessionRequest, SubmitAnswerRequest},
    session::PracticeSession,
    store::{PgStore, PracticeStore},
    utils::jwt::Claims,
};

/// Starts a new practice test for the current user.
///
/// Any existing incomplete session is replaced (at most one incomplete
/// session per user). Returns 404 when the selection policy yields no
/// questions.
pub async fn start_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);
    let config = SessionConfig::from(payload);

    let session = PracticeSession::start(&store, user_id, config).await?;

    Ok((StatusCode::CREATED, Json(session.view())))
}

/// Returns the current question and progress of the user's in-progress
/// session, re-attaching after a reload.
pub async fn current_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let session = resume(&store, user_id).await?;

    Ok(Json(session.view()))
}

/// Submits an answer for the current question.
pub async fn submit_answer(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let mut session = resume(&store, user_id).await?;
    let outcome = session.submit_answer(&store, payload.selected_choice).await?;

    Ok(Json(outcome))
}

/// Moves to the next question.
pub async fn advance(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let mut session = resume(&store, user_id).await?;
    session.advance(&store).await?;

    Ok(Json(session.view()))
}

/// Steps back one question for read-only review.
pub async fn go_back(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let mut session = resume(&store, user_id).await?;
    session.go_back(&store).await?;

    Ok(Json(session.view()))
}

/// Advances the countdown of a timed session by one second.
/// Expiry force-completes the session.
pub async fn tick(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let mut session = resume(&store, user_id).await?;
    let status = session.tick(&store).await?;

    Ok(Json(status))
}

/// Completes the in-progress session and returns the final score.
pub async fn complete_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let mut session = resume(&store, user_id).await?;
    let summary = session.complete(&store).await?;

    Ok(Json(summary))
}

/// Deletes the user's incomplete session; its answer records cascade.
pub async fn delete_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let session = resume(&store, user_id).await?;
    store.delete_session(user_id, session.session_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn resume(store: &PgStore, user_id: i64) -> Result<PracticeSession, AppError> {
    PracticeSession::resume(store, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No practice session in progress".to_string()))
}

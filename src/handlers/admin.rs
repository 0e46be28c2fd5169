// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{CreateQuestionRequest, Question},
        subject::CreateSubjectRequest,
    },
};

/// Creates a new subject.
/// Admin only.
pub async fn create_subject(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let id: i64 = sqlx::query_scalar("INSERT INTO subjects (name) VALUES ($1) RETURNING id")
        .bind(&payload.name)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Subject '{}' already exists", payload.name))
            } else {
                tracing::error!("Failed to create subject: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Lists the question bank, including unapproved entries.
/// Admin only.
pub async fn list_questions(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, subject_id, content, choices, correct_choice, analysis, approved, created_at \
         FROM questions ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(questions))
}

/// Creates a new bank question. New questions start unapproved and stay
/// out of session selection until approved.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (subject_id, content, choices, correct_choice, analysis) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(payload.subject_id)
    .bind(&payload.content)
    .bind(SqlJson(payload.choices))
    .bind(payload.correct_choice)
    .bind(&payload.analysis)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub subject_id: Option<i64>,
    pub content: Option<String>,
    pub choices: Option<Vec<String>>,
    pub correct_choice: Option<i16>,
    pub analysis: Option<String>,
}

/// Updates a question by ID. Answer records already written against the
/// question keep the correctness computed when they were submitted.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.subject_id.is_none()
        && payload.content.is_none()
        && payload.choices.is_none()
        && payload.correct_choice.is_none()
        && payload.analysis.is_none()
    {
        return Ok(StatusCode::OK);
    }

    if let Some(choices) = &payload.choices {
        if choices.len() != 4 {
            return Err(AppError::BadRequest(
                "Questions must carry exactly four choices".to_string(),
            ));
        }
    }
    if let Some(correct_choice) = payload.correct_choice {
        if !(1..=4).contains(&correct_choice) {
            return Err(AppError::BadRequest(
                "Correct choice must be between 1 and 4".to_string(),
            ));
        }
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(subject_id) = payload.subject_id {
        separated.push("subject_id = ");
        separated.push_bind_unseparated(subject_id);
    }

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(content);
    }

    if let Some(choices) = payload.choices {
        separated.push("choices = ");
        separated.push_bind_unseparated(serde_json::to_value(choices).unwrap_or_default());
    }

    if let Some(correct_choice) = payload.correct_choice {
        separated.push("correct_choice = ");
        separated.push_bind_unseparated(correct_choice);
    }

    if let Some(analysis) = payload.analysis {
        separated.push("analysis = ");
        separated.push_bind_unseparated(analysis);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Marks a question approved, making it eligible for selection.
/// Admin only.
pub async fn approve_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE questions SET approved = TRUE WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to approve question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a quiz question by ID.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

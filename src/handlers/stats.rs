// src/handlers/stats.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    stats::{ProbabilityEstimate, estimator},
    store::{PgStore, PracticeStore},
    utils::jwt::Claims,
};

/// Dashboard payload: lifetime counts plus the derived estimate.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_answered: i64,
    pub correct_answered: i64,
    pub estimate: ProbabilityEstimate,
}

/// Computes the user's pass probability from their lifetime answer
/// history. Recomputed on every call; with no history the estimate is
/// the all-zero no-data state, not an error.
pub async fn pass_probability(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let store = PgStore::new(pool);

    let counts = store.answer_counts(user_id).await?;
    let estimate = estimator::estimate(counts.total.max(0) as u64, counts.correct.max(0) as u64);

    Ok(Json(DashboardStats {
        total_answered: counts.total,
        correct_answered: counts.correct,
        estimate,
    }))
}

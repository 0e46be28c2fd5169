// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Number of answer choices on every bank question.
pub const CHOICE_COUNT: i16 = 4;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub subject_id: i64,

    /// The text content of the question.
    pub content: String,

    /// The four answer choices, stored as a JSON array in the database.
    pub choices: Json<Vec<String>>,

    /// 1-based index of the correct choice.
    pub correct_choice: i16,

    /// Explanation shown in tutor mode and on review.
    pub analysis: Option<String>,

    /// Only approved questions are eligible for selection into a session.
    pub approved: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    /// Strips the answer key for client delivery.
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            subject_id: self.subject_id,
            content: self.content.clone(),
            choices: self.choices.0.clone(),
        }
    }
}

/// DTO for sending a question to the client (excludes answer and analysis).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub subject_id: i64,
    pub content: String,
    pub choices: Vec<String>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub subject_id: i64,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(custom(function = validate_choices))]
    pub choices: Vec<String>,
    #[validate(range(min = 1, max = 4))]
    pub correct_choice: i16,
    #[validate(length(max = 4000))]
    pub analysis: Option<String>,
}

fn validate_choices(choices: &[String]) -> Result<(), validator::ValidationError> {
    if choices.len() != CHOICE_COUNT as usize {
        return Err(validator::ValidationError::new("exactly_four_choices_required"));
    }
    for choice in choices {
        if choice.is_empty() || choice.len() > 500 {
            return Err(validator::ValidationError::new("choice_length_invalid"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_choice_count() {
        let req = CreateQuestionRequest {
            subject_id: 1,
            content: "What is the limitation period?".to_string(),
            choices: vec!["Two years".to_string(), "Ten years".to_string()],
            correct_choice: 1,
            analysis: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn accepts_four_choices() {
        let req = CreateQuestionRequest {
            subject_id: 1,
            content: "What is the limitation period?".to_string(),
            choices: vec![
                "Two years".to_string(),
                "Ten years".to_string(),
                "Six months".to_string(),
                "No limit".to_string(),
            ],
            correct_choice: 1,
            analysis: Some("Basic limitation period under the Limitations Act.".to_string()),
        };
        assert!(req.validate().is_ok());
    }
}

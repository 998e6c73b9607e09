// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'quizzes' table in the database.
/// Immutable after creation; there is no update or delete path.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub teacher_id: i64,
    pub class_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_real_time: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Quiz {
    /// A quiz is open on the closed interval [start_time, end_time].
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// Represents the 'questions' table in the database.
/// Questions are addressable by id within their quiz so scoring can build
/// an id lookup instead of rescanning the sequence per answer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,

    /// List of options (e.g., ["Option A", "Option B"]).
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    pub correct_answer: String,
}

/// DTO for a question sent to the test-taking client (excludes the answer).
#[derive(Debug, Serialize)]
pub struct StudentQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: Json<Vec<String>>,
}

impl From<Question> for StudentQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            options: q.options,
        }
    }
}

/// A quiz together with its full question sequence (teacher-facing).
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

/// A quiz as served to a test-taking student: the correct answers are
/// stripped from every question before the payload leaves the server.
#[derive(Debug, Serialize)]
pub struct StudentQuizView {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<StudentQuestion>,
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub target_class_id: i64,
    #[validate(
        length(min = 1, message = "At least one question is required."),
        nested
    )]
    pub questions: Vec<CreateQuestionRequest>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_real_time")]
    pub is_real_time: bool,
}

fn default_real_time() -> bool {
    true
}

/// One question inside a quiz-creation request.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("invalid_option_length"));
        }
    }
    Ok(())
}

// src/models/submission.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::models::quiz::Question;

/// Represents the 'submissions' table in the database.
/// One graded record per (quiz, student) pair, enforced by a unique index.
/// Immutable after creation; the score is never recomputed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub answers: Json<Vec<SubmittedAnswer>>,
    pub score: i64,
    pub total_questions: i64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One answer inside a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub selected_option: String,
}

/// DTO for submitting quiz answers.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<SubmittedAnswer>,
}

/// Submission row joined with the submitting student, for teacher views.
#[derive(Debug, Serialize, FromRow)]
pub struct SubmissionWithStudent {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub student_email: String,
    pub score: i64,
    pub total_questions: i64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Counts correct answers against the quiz's answer key.
///
/// Each submitted (question id, selected option) pair scores one point when
/// the id resolves to a question of this quiz and the option equals its
/// correct answer. Unknown question ids are ignored rather than rejected.
pub fn score_answers(questions: &[Question], answers: &[SubmittedAnswer]) -> i64 {
    let key: HashMap<i64, &str> = questions
        .iter()
        .map(|q| (q.id, q.correct_answer.as_str()))
        .collect();

    answers
        .iter()
        .filter(|a| key.get(&a.question_id) == Some(&a.selected_option.as_str()))
        .count() as i64
}

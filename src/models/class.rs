// src/models/class.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

/// Represents the 'classes' table in the database.
/// A class is owned by the teacher who created it; that teacher also owns
/// the class's enrollment set.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub title: String,
    pub teacher_id: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new class.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

/// DTO for enrolling a student into a class.
#[derive(Debug, Deserialize)]
pub struct EnrollStudentRequest {
    pub student_id: i64,
}

/// Enrollment directory: membership lookups shared by the quiz handlers.
/// Writes to the roster live in the class handlers, not here.
pub async fn is_enrolled(
    pool: &SqlitePool,
    student_id: i64,
    class_id: i64,
) -> sqlx::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM enrollments WHERE student_id = ? AND class_id = ?",
    )
    .bind(student_id)
    .bind(class_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Ids of every class the student is enrolled in.
pub async fn classes_of(pool: &SqlitePool, student_id: i64) -> sqlx::Result<Vec<i64>> {
    sqlx::query_scalar("SELECT class_id FROM enrollments WHERE student_id = ?")
        .bind(student_id)
        .fetch_all(pool)
        .await
}

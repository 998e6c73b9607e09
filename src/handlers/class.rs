// src/handlers/class.rs

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    extract::Json,
    handlers::auth::is_unique_violation,
    models::class::{Class, CreateClassRequest, EnrollStudentRequest},
    utils::jwt::Claims,
};

/// TEACHER ONLY: Creates a new class owned by the caller.
pub async fn create_class(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("teacher")?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let teacher_id = claims.user_id()?;

    let class = sqlx::query_as::<_, Class>(
        r#"
        INSERT INTO classes (title, teacher_id)
        VALUES (?, ?)
        RETURNING id, title, teacher_id, created_at
        "#,
    )
    .bind(&payload.title)
    .bind(teacher_id)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(class)))
}

/// TEACHER ONLY: Lists the classes owned by the caller.
pub async fn list_my_classes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("teacher")?;
    let teacher_id = claims.user_id()?;

    let classes = sqlx::query_as::<_, Class>(
        "SELECT id, title, teacher_id, created_at FROM classes WHERE teacher_id = ?",
    )
    .bind(teacher_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(classes))
}

/// TEACHER ONLY: Enrolls a student into one of the caller's classes.
///
/// The (class, student) pair is unique; enrolling twice yields 409.
pub async fn enroll_student(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<i64>,
    Json(payload): Json<EnrollStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("teacher")?;
    let teacher_id = claims.user_id()?;

    let class = sqlx::query_as::<_, Class>(
        "SELECT id, title, teacher_id, created_at FROM classes WHERE id = ?",
    )
    .bind(class_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Class not found.".to_string()))?;

    if class.teacher_id != teacher_id {
        return Err(AppError::Forbidden(
            "You are not the teacher of this class.".to_string(),
        ));
    }

    let student_role: Option<String> =
        sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
            .bind(payload.student_id)
            .fetch_optional(&pool)
            .await?;

    match student_role.as_deref() {
        None => return Err(AppError::NotFound("Student not found.".to_string())),
        Some("student") => {}
        Some(_) => {
            return Err(AppError::BadRequest(
                "Only students can be enrolled in a class.".to_string(),
            ));
        }
    }

    sqlx::query("INSERT INTO enrollments (class_id, student_id) VALUES (?, ?)")
        .bind(class_id)
        .bind(payload.student_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Student is already enrolled in this class.".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "classId": class_id,
            "studentId": payload.student_id,
        })),
    ))
}

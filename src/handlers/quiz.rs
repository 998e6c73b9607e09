// src/handlers/quiz.rs
//
// The quiz session flows: a teacher publishes a quiz to one of their
// classes, a student fetches it inside its time window, submits once, and
// reads the graded result. Lifecycle events fan out to the class room
// (publication) and the teacher room (submission) after the write commits.

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    extract::Json,
    handlers::auth::is_unique_violation,
    models::{
        class::{self, Class},
        quiz::{CreateQuizRequest, Question, Quiz, QuizDetail, StudentQuizView},
        submission::{
            Submission, SubmissionWithStudent, SubmitQuizRequest, score_answers,
        },
    },
    notify::{self, NotificationHub},
    utils::jwt::Claims,
};

const QUIZ_COLUMNS: &str = "id, title, description, teacher_id, class_id, \
     start_time, end_time, is_real_time, created_at";

async fn fetch_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE id = ?",
        QUIZ_COLUMNS
    ))
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found.".to_string()))
}

async fn fetch_questions(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, question_text, options, correct_answer
         FROM questions WHERE quiz_id = ? ORDER BY id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

async fn has_submitted(
    pool: &SqlitePool,
    quiz_id: i64,
    student_id: i64,
) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM submissions WHERE quiz_id = ? AND student_id = ?",
    )
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// TEACHER ONLY: Creates a quiz targeting one of the caller's classes.
///
/// Persists the quiz and its questions in one transaction, then announces
/// it to the class room. A fan-out with nobody listening is not an error.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    State(hub): State<NotificationHub>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("teacher")?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.start_time >= payload.end_time {
        return Err(AppError::BadRequest(
            "startTime must be earlier than endTime.".to_string(),
        ));
    }
    for question in &payload.questions {
        if !question.options.contains(&question.correct_answer) {
            return Err(AppError::BadRequest(format!(
                "Correct answer for '{}' is not one of its options.",
                question.question_text
            )));
        }
    }

    let teacher_id = claims.user_id()?;

    let class = sqlx::query_as::<_, Class>(
        "SELECT id, title, teacher_id, created_at FROM classes WHERE id = ?",
    )
    .bind(payload.target_class_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Target class not found.".to_string()))?;

    if class.teacher_id != teacher_id {
        return Err(AppError::Forbidden(
            "You are not the teacher of this class.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        INSERT INTO quizzes (title, description, teacher_id, class_id,
                             start_time, end_time, is_real_time)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        QUIZ_COLUMNS
    ))
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(teacher_id)
    .bind(payload.target_class_id)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.is_real_time)
    .fetch_one(&mut *tx)
    .await?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for q in &payload.questions {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (quiz_id, question_text, options, correct_answer)
            VALUES (?, ?, ?, ?)
            RETURNING id, quiz_id, question_text, options, correct_answer
            "#,
        )
        .bind(quiz.id)
        .bind(&q.question_text)
        .bind(serde_json::to_string(&q.options)?)
        .bind(&q.correct_answer)
        .fetch_one(&mut *tx)
        .await?;
        questions.push(question);
    }

    tx.commit().await?;

    // Fan-out strictly after the commit; its outcome never fails the request.
    let delivered = hub.publish(
        &notify::class_topic(quiz.class_id),
        notify::EVENT_QUIZ_PUBLISHED,
        serde_json::json!({
            "quizId": quiz.id,
            "title": quiz.title,
            "message": format!("A new quiz \"{}\" has been created!", quiz.title),
        }),
    );
    tracing::info!(
        "Quiz {} announced to room class:{} ({} subscribers)",
        quiz.id,
        quiz.class_id,
        delivered
    );

    Ok((StatusCode::CREATED, Json(QuizDetail { quiz, questions })))
}

/// STUDENT ONLY: Lists the currently-open quizzes of the caller's classes.
pub async fn list_student_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("student")?;
    let student_id = claims.user_id()?;

    let class_ids = class::classes_of(&pool, student_id).await?;
    if class_ids.is_empty() {
        return Ok(Json(Vec::<Quiz>::new()));
    }

    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM quizzes WHERE class_id IN (",
        QUIZ_COLUMNS
    ));
    let mut separated = builder.separated(",");
    for id in &class_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let quizzes: Vec<Quiz> = builder.build_query_as().fetch_all(&pool).await?;

    let now = Utc::now();
    let open: Vec<Quiz> = quizzes.into_iter().filter(|q| q.is_open(now)).collect();

    Ok(Json(open))
}

/// STUDENT ONLY: Fetches a quiz for taking.
///
/// Gated on the quiz window, the caller's enrollment and the absence of a
/// prior submission. Correct answers are stripped from the payload.
pub async fn get_quiz_for_student(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("student")?;
    let student_id = claims.user_id()?;

    let quiz = fetch_quiz(&pool, quiz_id).await?;

    if !quiz.is_open(Utc::now()) {
        return Err(AppError::Forbidden(
            "Quiz is not currently available.".to_string(),
        ));
    }

    if !class::is_enrolled(&pool, student_id, quiz.class_id).await? {
        return Err(AppError::Forbidden(
            "You are not authorized to take this quiz.".to_string(),
        ));
    }

    if has_submitted(&pool, quiz_id, student_id).await? {
        return Err(AppError::Forbidden(
            "You have already submitted this quiz.".to_string(),
        ));
    }

    let questions = fetch_questions(&pool, quiz_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(StudentQuizView { quiz, questions }))
}

/// STUDENT ONLY: Submits answers and records the graded result.
///
/// The window and enrollment were already gated on the fetch path; a quiz a
/// student managed to fetch stays submittable, so they are not re-checked
/// here. The unique index on (quiz_id, student_id) is the authoritative
/// duplicate guard; the pre-check only gives a friendlier early 409.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    State(hub): State<NotificationHub>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("student")?;
    let student_id = claims.user_id()?;

    let quiz = fetch_quiz(&pool, quiz_id).await?;

    if has_submitted(&pool, quiz_id, student_id).await? {
        return Err(AppError::Conflict(
            "You have already submitted this quiz.".to_string(),
        ));
    }

    let questions = fetch_questions(&pool, quiz_id).await?;
    let score = score_answers(&questions, &payload.answers);
    let total_questions = questions.len() as i64;

    let submission = sqlx::query_as::<_, Submission>(
        r#"
        INSERT INTO submissions (quiz_id, student_id, answers, score, total_questions)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, quiz_id, student_id, answers, score, total_questions, submitted_at
        "#,
    )
    .bind(quiz_id)
    .bind(student_id)
    .bind(serde_json::to_string(&payload.answers)?)
    .bind(score)
    .bind(total_questions)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("You have already submitted this quiz.".to_string())
        } else {
            tracing::error!("Failed to record submission: {:?}", e);
            AppError::from(e)
        }
    })?;

    let delivered = hub.publish(
        &notify::teacher_topic(quiz.teacher_id),
        notify::EVENT_QUIZ_SUBMITTED,
        serde_json::json!({
            "quizId": quiz_id,
            "studentId": student_id,
            "score": score,
        }),
    );
    tracing::info!(
        "Submission for quiz {} announced to room teacher:{} ({} subscribers)",
        quiz_id,
        quiz.teacher_id,
        delivered
    );

    Ok((StatusCode::CREATED, Json(submission)))
}

/// STUDENT ONLY: Returns the caller's graded submission for a quiz.
pub async fn get_quiz_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("student")?;
    let student_id = claims.user_id()?;

    let submission = sqlx::query_as::<_, Submission>(
        "SELECT id, quiz_id, student_id, answers, score, total_questions, submitted_at
         FROM submissions WHERE quiz_id = ? AND student_id = ?",
    )
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Submission not found.".to_string()))?;

    Ok(Json(submission))
}

/// TEACHER ONLY: Lists every quiz of one of the caller's classes.
pub async fn list_class_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("teacher")?;
    let teacher_id = claims.user_id()?;

    let owner: Option<i64> = sqlx::query_scalar("SELECT teacher_id FROM classes WHERE id = ?")
        .bind(class_id)
        .fetch_optional(&pool)
        .await?;

    if owner != Some(teacher_id) {
        return Err(AppError::Forbidden(
            "You are not authorized to view this class.".to_string(),
        ));
    }

    let quizzes = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE class_id = ?",
        QUIZ_COLUMNS
    ))
    .bind(class_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

/// TEACHER ONLY: Lists every submission for one of the caller's quizzes.
pub async fn list_quiz_submissions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_role("teacher")?;
    let teacher_id = claims.user_id()?;

    let owner: Option<i64> = sqlx::query_scalar("SELECT teacher_id FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(&pool)
        .await?;

    if owner != Some(teacher_id) {
        return Err(AppError::Forbidden(
            "You are not the teacher of this quiz.".to_string(),
        ));
    }

    let submissions = sqlx::query_as::<_, SubmissionWithStudent>(
        r#"
        SELECT
            s.id, s.quiz_id, s.student_id,
            u.name AS student_name, u.email AS student_email,
            s.score, s.total_questions, s.submitted_at
        FROM submissions s
        JOIN users u ON s.student_id = u.id
        WHERE s.quiz_id = ?
        ORDER BY s.submitted_at ASC
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(submissions))
}

// tests/common/mod.rs

use coaching_backend::{config::Config, notify::NotificationHub, routes, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;

/// Spawns the app on a random port backed by a fresh in-memory database.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app() -> String {
    spawn_app_with_state().await.0
}

/// Like [`spawn_app`], but also hands back the application state so tests
/// can subscribe to the notification hub directly.
pub async fn spawn_app_with_state() -> (String, AppState) {
    // A single connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_email: None,
        admin_password: None,
    };

    let state = AppState {
        pool,
        config,
        hub: NotificationHub::new(),
    };

    let app = routes::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, state)
}

/// Registers a fresh user with the given role and logs them in.
/// Returns (token, user id).
pub async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    role: &str,
) -> (String, i64) {
    let email = format!("{}_{}@test.local", role, &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": format!("Test {}", role),
            "email": email,
            "password": password,
            "role": role,
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    (
        login["token"].as_str().expect("Token not found").to_string(),
        login["id"].as_i64().expect("Id not found"),
    )
}

/// Creates a class owned by `teacher_token` and returns its id.
pub async fn create_class(client: &reqwest::Client, address: &str, teacher_token: &str) -> i64 {
    let resp: serde_json::Value = client
        .post(format!("{}/api/classes", address))
        .bearer_auth(teacher_token)
        .json(&serde_json::json!({ "title": "Physics Batch A" }))
        .send()
        .await
        .expect("Create class failed")
        .json()
        .await
        .expect("Failed to parse class json");

    resp["id"].as_i64().expect("Class id not found")
}

/// Enrolls `student_id` into `class_id`.
pub async fn enroll(
    client: &reqwest::Client,
    address: &str,
    teacher_token: &str,
    class_id: i64,
    student_id: i64,
) -> reqwest::Response {
    client
        .post(format!("{}/api/classes/{}/students", address, class_id))
        .bearer_auth(teacher_token)
        .json(&serde_json::json!({ "student_id": student_id }))
        .send()
        .await
        .expect("Enroll failed")
}

/// A three-question quiz payload with answer key {A, B, C} and the given
/// window offsets (in minutes) relative to now.
pub fn quiz_payload(class_id: i64, start_offset_min: i64, end_offset_min: i64) -> serde_json::Value {
    let now = chrono::Utc::now();
    let start = now + chrono::Duration::minutes(start_offset_min);
    let end = now + chrono::Duration::minutes(end_offset_min);

    serde_json::json!({
        "title": "Weekly Test",
        "description": "Chapters 1-3",
        "targetClassId": class_id,
        "startTime": start.to_rfc3339(),
        "endTime": end.to_rfc3339(),
        "questions": [
            { "questionText": "Q1", "options": ["A", "B", "C", "X"], "correctAnswer": "A" },
            { "questionText": "Q2", "options": ["A", "B", "C", "X"], "correctAnswer": "B" },
            { "questionText": "Q3", "options": ["A", "B", "C", "X"], "correctAnswer": "C" },
        ],
    })
}

/// Creates a quiz and returns the response body. Asserts 201.
pub async fn create_quiz(
    client: &reqwest::Client,
    address: &str,
    teacher_token: &str,
    payload: &serde_json::Value,
) -> serde_json::Value {
    let resp = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(teacher_token)
        .json(payload)
        .send()
        .await
        .expect("Create quiz failed");
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.expect("Failed to parse quiz json")
}

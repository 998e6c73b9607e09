// tests/api_tests.rs
//
// Account and roster coverage: registration, login, class creation and
// enrollment uniqueness.

mod common;

use common::*;

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_and_login_work() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (token, id) = register_and_login(&client, &address, "student").await;
    assert!(!token.is_empty());
    assert!(id > 0);
}

#[tokio::test]
async fn register_rejects_bad_input() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Not an email address.
    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "X",
            "email": "not-an-email",
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    // Missing fields are a 400 like any other bad body.
    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "email": "partial@test.local" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    // Admin accounts cannot be self-registered.
    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "X",
            "email": "someone@test.local",
            "password": "password123",
            "role": "admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "name": "Dup",
        "email": "dup@test.local",
        "password": "password123",
    });

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (_, _) = register_and_login(&client, &address, "student").await;

    let resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "email": "nobody@test.local",
            "password": "wrong-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn enrollment_is_unique_and_owner_scoped() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (owner_token, _) = register_and_login(&client, &address, "teacher").await;
    let (other_token, _) = register_and_login(&client, &address, "teacher").await;
    let (_, student_id) = register_and_login(&client, &address, "student").await;
    let class_id = create_class(&client, &address, &owner_token).await;

    // First enrollment succeeds, re-enrollment conflicts.
    let first = enroll(&client, &address, &owner_token, class_id, student_id).await;
    assert_eq!(first.status().as_u16(), 201);
    let second = enroll(&client, &address, &owner_token, class_id, student_id).await;
    assert_eq!(second.status().as_u16(), 409);

    // A teacher cannot touch another teacher's roster.
    let foreign = enroll(&client, &address, &other_token, class_id, student_id).await;
    assert_eq!(foreign.status().as_u16(), 403);

    // Enrolling a non-student is rejected.
    let (_, other_teacher_id) = register_and_login(&client, &address, "teacher").await;
    let bad = enroll(&client, &address, &owner_token, class_id, other_teacher_id).await;
    assert_eq!(bad.status().as_u16(), 400);

    // Unknown student is 404.
    let missing = enroll(&client, &address, &owner_token, class_id, 999999).await;
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn class_listing_is_scoped_to_owner() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (owner_token, owner_id) = register_and_login(&client, &address, "teacher").await;
    let (other_token, _) = register_and_login(&client, &address, "teacher").await;
    create_class(&client, &address, &owner_token).await;

    let mine: Vec<serde_json::Value> = client
        .get(format!("{}/api/classes", address))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["teacher_id"].as_i64().unwrap(), owner_id);

    let theirs: Vec<serde_json::Value> = client
        .get(format!("{}/api/classes", address))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(theirs.is_empty());
}

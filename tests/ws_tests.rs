// tests/ws_tests.rs
//
// Live-channel coverage over a real WebSocket client: handshake
// authentication, the join/deny protocol, and delivery of quiz events to a
// joined room.

mod common;

use common::*;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite};

fn ws_url(address: &str, token: Option<&str>) -> String {
    let base = address.replacen("http://", "ws://", 1);
    match token {
        Some(token) => format!("{}/api/ws?token={}", base, token),
        None => format!("{}/api/ws", base),
    }
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(address: &str, token: &str) -> WsClient {
    let (socket, _) = connect_async(ws_url(address, Some(token)))
        .await
        .expect("WebSocket handshake failed");
    socket
}

/// Sends a join request and returns the server's reply frame.
async fn join_room(socket: &mut WsClient, room: &str) -> serde_json::Value {
    socket
        .send(tungstenite::Message::text(
            serde_json::json!({ "type": "join_room", "room": room }).to_string(),
        ))
        .await
        .expect("Failed to send join_room");
    next_frame(socket).await
}

async fn next_frame(socket: &mut WsClient) -> serde_json::Value {
    let msg = socket
        .next()
        .await
        .expect("Connection closed")
        .expect("WebSocket error");
    let text = msg.into_text().expect("Expected a text frame");
    serde_json::from_str(text.as_str()).expect("Frame is not JSON")
}

#[tokio::test]
async fn handshake_requires_a_valid_token() {
    let address = spawn_app().await;

    for url in [
        ws_url(&address, None),
        ws_url(&address, Some("not-a-jwt")),
    ] {
        let err = connect_async(url).await.unwrap_err();
        match err {
            tungstenite::Error::Http(resp) => assert_eq!(resp.status().as_u16(), 401),
            other => panic!("Expected an HTTP rejection, got: {:?}", other),
        }
    }
}

#[tokio::test]
async fn joined_student_receives_quiz_announcements() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (teacher_token, _) = register_and_login(&client, &address, "teacher").await;
    let (student_token, student_id) = register_and_login(&client, &address, "student").await;
    let class_id = create_class(&client, &address, &teacher_token).await;
    enroll(&client, &address, &teacher_token, class_id, student_id).await;

    let mut socket = connect(&address, &student_token).await;
    let reply = join_room(&mut socket, &format!("class:{}", class_id)).await;
    assert_eq!(reply["type"], "joined");
    assert_eq!(reply["room"], format!("class:{}", class_id));

    let quiz = create_quiz(
        &client,
        &address,
        &teacher_token,
        &quiz_payload(class_id, -30, 30),
    )
    .await;

    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["event"], "new_quiz_available");
    assert_eq!(frame["data"]["quizId"], quiz["id"]);
    assert_eq!(frame["data"]["title"], "Weekly Test");
}

#[tokio::test]
async fn joined_teacher_receives_submission_events() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (teacher_token, teacher_id) = register_and_login(&client, &address, "teacher").await;
    let (student_token, student_id) = register_and_login(&client, &address, "student").await;
    let class_id = create_class(&client, &address, &teacher_token).await;
    enroll(&client, &address, &teacher_token, class_id, student_id).await;
    let quiz = create_quiz(
        &client,
        &address,
        &teacher_token,
        &quiz_payload(class_id, -30, 30),
    )
    .await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let mut socket = connect(&address, &teacher_token).await;
    let reply = join_room(&mut socket, &format!("teacher:{}", teacher_id)).await;
    assert_eq!(reply["type"], "joined");

    let q1_id = quiz["questions"][0]["id"].clone();
    client
        .post(format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({
            "answers": [{ "questionId": q1_id, "selectedOption": "A" }]
        }))
        .send()
        .await
        .unwrap();

    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["event"], "studentQuizSubmitted");
    assert_eq!(frame["data"]["quizId"].as_i64().unwrap(), quiz_id);
    assert_eq!(frame["data"]["studentId"].as_i64().unwrap(), student_id);
    assert_eq!(frame["data"]["score"].as_i64().unwrap(), 1);
}

#[tokio::test]
async fn unauthorized_rooms_are_denied() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (teacher_token, teacher_id) = register_and_login(&client, &address, "teacher").await;
    let (student_token, _) = register_and_login(&client, &address, "student").await;
    let class_id = create_class(&client, &address, &teacher_token).await;
    // The student is deliberately not enrolled.

    let mut socket = connect(&address, &student_token).await;
    for room in [
        format!("class:{}", class_id),
        format!("teacher:{}", teacher_id),
        "lobby".to_string(),
    ] {
        let reply = join_room(&mut socket, &room).await;
        assert_eq!(reply["type"], "error", "room {:?} should be denied", room);
    }

    // The connection stays usable after a denial.
    socket
        .send(tungstenite::Message::text("not json"))
        .await
        .unwrap();
    let reply = next_frame(&mut socket).await;
    assert_eq!(reply["type"], "error");
}

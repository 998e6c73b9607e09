// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, class, quiz, ws},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, classes, quizzes, ws).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, notification hub).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let class_routes = Router::new()
        .route("/", post(class::create_class).get(class::list_my_classes))
        .route("/{class_id}/students", post(class::enroll_student))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let quiz_routes = Router::new()
        .route("/", post(quiz::create_quiz).get(quiz::list_student_quizzes))
        .route("/class/{class_id}", get(quiz::list_class_quizzes))
        .route("/{quiz_id}", get(quiz::get_quiz_for_student))
        .route("/{quiz_id}/submit", post(quiz::submit_quiz))
        .route("/{quiz_id}/result", get(quiz::get_quiz_result))
        .route("/{quiz_id}/submissions", get(quiz::list_quiz_submissions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/classes", class_routes)
        .nest("/api/quizzes", quiz_routes)
        // The WebSocket handshake authenticates via query token instead of
        // the Authorization header, so it sits outside auth_middleware.
        .route("/api/ws", get(ws::ws_handler))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::attempt, state::AppState};

/// Assembles the main application router.
///
/// * Mounts the attempt routes under `/api/attempts`.
/// * Applies global middleware (Trace, CORS for the dashboard dev server).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:5173"),
        HeaderValue::from_static("http://127.0.0.1:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    let attempt_routes = Router::new()
        .route("/", post(attempt::start_attempt))
        .route("/{id}", get(attempt::get_attempt))
        .route("/{id}/answers", put(attempt::record_answer))
        .route("/{id}/navigate", post(attempt::navigate))
        .route("/{id}/next", post(attempt::next_question))
        .route("/{id}/previous", post(attempt::previous_question))
        .route("/{id}/submit", post(attempt::submit_attempt))
        .route("/{id}/result", get(attempt::get_result))
        .route("/{id}/result/publish", post(attempt::publish_result));

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest("/api/attempts", attempt_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

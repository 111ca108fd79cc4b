// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerRequest, NavigateRequest, StartAttemptRequest},
        result::ResultView,
    },
    services::ExamClient,
    state::AttemptRegistry,
};

/// Starts a new attempt.
///
/// * Loads the exam through the retrying gateway (4xx surfaced, 5xx retried).
/// * Starts the countdown with the exam's duration.
/// * Returns the initial snapshot.
pub async fn start_attempt(
    State(client): State<Arc<ExamClient>>,
    State(registry): State<AttemptRegistry>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exam = client.fetch_exam(payload.exam_id).await.map_err(|e| {
        tracing::warn!("Failed to load exam {}: {}", payload.exam_id, e);
        e
    })?;

    let session = registry.start(Arc::new(exam), payload.student_id).await;

    Ok((StatusCode::CREATED, Json(session.snapshot())))
}

/// Returns the current snapshot of an attempt.
pub async fn get_attempt(
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(id).await?;
    Ok(Json(session.snapshot()))
}

/// Records an answer: `optionId` for choice questions, `text` for short-answer ones.
pub async fn record_answer(
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let session = registry.get(id).await?;

    match (payload.option_id, payload.text) {
        (Some(option_id), None) => session.select_answer(payload.question_id, option_id)?,
        (None, Some(text)) => session.answer_text(payload.question_id, text)?,
        _ => {
            return Err(AppError::BadRequest(
                "Provide exactly one of optionId or text".to_string(),
            ));
        }
    }

    Ok(Json(session.snapshot()))
}

pub async fn navigate(
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(id).await?;
    session.go_to_question(payload.index)?;
    Ok(Json(session.snapshot()))
}

pub async fn next_question(
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(id).await?;
    session.next()?;
    Ok(Json(session.snapshot()))
}

pub async fn previous_question(
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(id).await?;
    session.previous()?;
    Ok(Json(session.snapshot()))
}

/// Submits the attempt and returns its result.
/// A second submission (or one after the timeout) is a 409.
/// The result is pushed upstream in the background; `publish` reports progress.
pub async fn submit_attempt(
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(id).await?;
    let result = session.submit()?;
    let publish = session.publish_status().unwrap_or_default();
    Ok(Json(ResultView { result, publish }))
}

/// Returns the result of a submitted attempt with its delivery state.
pub async fn get_result(
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(id).await?;
    let view = session
        .result_view()
        .ok_or_else(|| AppError::InvalidState(format!("Attempt {} is still in progress", id)))?;
    Ok(Json(view))
}

/// Pushes the result upstream again, e.g. after a failed delivery.
///
/// * Upstream errors are surfaced after the gateway's retries.
/// * An already published result is not posted twice.
pub async fn publish_result(
    State(client): State<Arc<ExamClient>>,
    State(registry): State<AttemptRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(id).await?;
    let view = session.republish(&client).await.map_err(|e| {
        tracing::warn!("Re-publishing result of attempt {} failed: {}", id, e);
        e
    })?;
    Ok(Json(view))
}

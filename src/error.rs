// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::gateway::FetchError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // 409 Conflict: the attempt is already submitted
    InvalidState(String),

    // 404 Not Found: unknown attempt, question or option
    NotFound(String),

    // 422 Unprocessable Entity: navigation index out of bounds
    OutOfRange(String),

    // 400 Bad Request
    BadRequest(String),

    // 502 Bad Gateway: upstream unreachable or timed out after retries
    Network(String),

    // 502 Bad Gateway: upstream answered 5xx after retries
    Server { status: u16, message: String },

    // Upstream 4xx, surfaced with the same status
    Upstream { status: u16, message: String },

    // 502 Bad Gateway: upstream answered with an unreadable body
    BadGateway(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            AppError::NotFound(msg) => write!(f, "not found: {}", msg),
            AppError::OutOfRange(msg) => write!(f, "out of range: {}", msg),
            AppError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            AppError::Network(msg) => write!(f, "network error: {}", msg),
            AppError::Server { status, message } => {
                write!(f, "upstream server error ({}): {}", status, message)
            }
            AppError::Upstream { status, message } => {
                write!(f, "upstream rejected request ({}): {}", status, message)
            }
            AppError::BadGateway(msg) => write!(f, "bad upstream response: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::OutOfRange(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Network(msg) => {
                tracing::error!("Upstream unreachable: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::Server { status, message } => {
                tracing::error!("Upstream failed with {}: {}", status, message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("Upstream service error ({})", status),
                )
            }
            AppError::Upstream { status, message } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
            ),
            AppError::BadGateway(msg) => {
                tracing::error!("Unreadable upstream response: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream returned an unexpected response".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Folds gateway failures into the application taxonomy.
impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(msg) | FetchError::Unreachable(msg) | FetchError::Transport(msg) => {
                AppError::Network(msg)
            }
            FetchError::Server { status, body } => AppError::Server {
                status,
                message: body,
            },
            FetchError::Client { status, body } => AppError::Upstream {
                status,
                message: body,
            },
            FetchError::Decode(msg) => AppError::BadGateway(msg),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

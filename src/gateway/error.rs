// src/gateway/error.rs

use std::fmt;

/// Failure of a single gateway request, after retries where applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request or connection timed out.
    Timeout(String),
    /// The host could not be reached (DNS, refused, reset).
    Unreachable(String),
    /// Any other transport failure (bad URL, TLS, body encoding).
    Transport(String),
    /// HTTP 5xx.
    Server { status: u16, body: String },
    /// HTTP 4xx.
    Client { status: u16, body: String },
    /// The response body did not match the expected shape.
    Decode(String),
}

impl FetchError {
    /// Connection timeouts, unreachable hosts and 5xx responses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_) | FetchError::Unreachable(_) | FetchError::Server { .. }
        )
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout(msg) => write!(f, "request timed out: {}", msg),
            FetchError::Unreachable(msg) => write!(f, "network unreachable: {}", msg),
            FetchError::Transport(msg) => write!(f, "transport error: {}", msg),
            FetchError::Server { status, body } => write!(f, "server error {}: {}", status, body),
            FetchError::Client { status, body } => write!(f, "client error {}: {}", status, body),
            FetchError::Decode(msg) => write!(f, "unexpected response body: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_connect() {
            FetchError::Unreachable(err.to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

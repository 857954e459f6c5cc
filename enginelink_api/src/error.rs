use enginelink_common::RetryableError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TransportError;

/// Classification of a failed engine request, ordered by how the client reacts
/// to it: only `Network` and `Timeout` are transient enough to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    Network,
    Timeout,
    Server,
    Authentication,
    Validation,
    Cors,
    Unknown,
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Server => "server",
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::Cors => "cors",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A failed engine request. Carries enough to both render a message and let
/// the connection state machine map the failure to a status.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Parsed error body, when the server sent one.
    pub data: Option<Value>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            data: None,
        }
    }

    /// Maps a non-2xx response onto the error taxonomy. Response-class
    /// failures are never retried, so classification happens immediately.
    pub fn from_status(status: http::StatusCode, data: Option<Value>) -> Self {
        use ApiErrorKind::*;
        let (kind, message) = match status.as_u16() {
            401 => (
                Authentication,
                "Authentication failed. Please log in again.".to_string(),
            ),
            403 => (
                Authentication,
                "You do not have permission to perform this action.".to_string(),
            ),
            400 | 422 => (Validation, "Invalid request data.".to_string()),
            404 => (Server, "Resource not found.".to_string()),
            429 => (
                Server,
                "Too many requests. Please try again later.".to_string(),
            ),
            500 | 502 | 503 | 504 => (Server, "Server error. Please try again later.".to_string()),
            s => (
                Server,
                format!(
                    "Server error: {s} {}",
                    status.canonical_reason().unwrap_or_default()
                ),
            ),
        };

        Self {
            kind,
            message,
            status: Some(status.as_u16()),
            data,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::TimedOut => Self::new(ApiErrorKind::Timeout, "Request timed out"),
            TransportError::Cors(message) => Self::new(
                ApiErrorKind::Cors,
                format!("CORS error: The server may not allow requests from this origin ({message})"),
            ),
            TransportError::Connect(message) => Self::new(ApiErrorKind::Network, message),
        }
    }
}

impl RetryableError for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Network | ApiErrorKind::Timeout)
    }
}

//! Error types for the backup server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docvault_core::{CoreError, ErrorKind, ServiceError};
use serde_json::json;
use thiserror::Error;

/// Result type for server startup and shutdown.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from running.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The vault could not be opened.
    #[error("cannot open vault: {0}")]
    Vault(#[from] CoreError),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An error answered to an HTTP client.
///
/// Rendered as `{"ok": false, "error": {"kind", "message"}}`.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error with an explicit status.
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// Missing or wrong bearer token.
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        )
    }

    /// Internal failure outside the core (task panics, runtime shutdown).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Internal.as_str(),
            message,
        )
    }

    /// The core did not answer within the request timeout.
    pub fn request_timeout() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::TimedOut.as_str(),
            "request timed out",
        )
    }

    /// Returns the HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

/// Maps a service error kind onto an HTTP status.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Busy => StatusCode::CONFLICT,
        ErrorKind::TimedOut => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Corrupted | ErrorKind::CommitFailed | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::new(status_for(err.kind()), err.kind().as_str(), err.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, kind = self.kind, message = %self.message, "request failed");
        } else {
            tracing::debug!(status = %self.status, kind = self.kind, message = %self.message, "request rejected");
        }
        let body = json!({
            "ok": false,
            "error": { "kind": self.kind, "message": self.message },
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Busy), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::TimedOut),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(ErrorKind::CommitFailed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn error_body_matches_contract() {
        let err = ApiError::from(ServiceError::new(ErrorKind::InvalidInput, "not json"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "invalid_input");
        assert_eq!(json["error"]["message"], "not json");
    }
}

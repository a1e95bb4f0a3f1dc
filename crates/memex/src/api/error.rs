//! Mapping of [`MemexError`] onto HTTP responses
//!
//! Every failure is rendered as `{"error": {"kind": ..., "message": ...}}`.

use std::time::Duration;

use axum::{
    BoxError, Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use tower::timeout::error::Elapsed;

use crate::error::MemexError;

impl MemexError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MemexError::Validation(_) => StatusCode::BAD_REQUEST,
            MemexError::Auth(_) => StatusCode::UNAUTHORIZED,
            MemexError::Embedding(_) => StatusCode::BAD_GATEWAY,
            MemexError::EmbeddingTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            MemexError::RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            MemexError::Storage(_)
            | MemexError::Config(_)
            | MemexError::Io(_)
            | MemexError::Serialization(_)
            | MemexError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MemexError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        } else {
            tracing::debug!("Request rejected: {self}");
        }

        let body = serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Errors raised by the middleware stack rather than a handler.
pub fn middleware_error(err: BoxError, request_timeout: Duration) -> MemexError {
    if err.is::<Elapsed>() {
        MemexError::RequestTimeout(request_timeout)
    } else {
        MemexError::Internal(err.to_string())
    }
}

/// Malformed or mistyped JSON bodies are validation failures.
pub fn json_rejection(rejection: JsonRejection) -> MemexError {
    MemexError::Validation(rejection.body_text())
}

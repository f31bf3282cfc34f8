//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engram_core::EngramError;
use serde::Serialize;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error surfaced by a handler, carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }
}

impl From<EngramError> for ApiError {
    fn from(err: EngramError) -> Self {
        let (status, code) = match &err {
            EngramError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            EngramError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            EngramError::DimensionMismatch { .. } => (StatusCode::BAD_REQUEST, "DIMENSION_MISMATCH"),
            EngramError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            EngramError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            EngramError::Internal(_) | EngramError::Io(_) | EngramError::Serde(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
            }
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        (
            self.status,
            Json(ErrorBody {
                error: ErrorDetail {
                    code: self.code,
                    message: self.message,
                },
            }),
        )
            .into_response()
    }
}

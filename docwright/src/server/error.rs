//! API error type: maps pipeline failures onto HTTP statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docwright_core::error::{CompletionError, DocError, FetchError, ParseError, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ApiError {
    /// The request body itself could not be read as JSON.
    BadRequest(String),
    Doc(DocError),
}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Doc(DocError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Doc(DocError::Parse(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Doc(DocError::Completion(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Doc(DocError::Fetch(FetchError::RateLimited { .. })) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Doc(DocError::Fetch(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Doc(DocError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "{msg}"),
            ApiError::Doc(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %message, "Request rejected");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<DocError> for ApiError {
    fn from(err: DocError) -> Self {
        ApiError::Doc(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Doc(err.into())
    }
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        ApiError::Doc(err.into())
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        ApiError::Doc(err.into())
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        ApiError::Doc(err.into())
    }
}

//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures of the upload flow. Details are logged; clients get a fixed message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file uploaded")]
    NoFileUploaded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Annotation failed: {0}")]
    Annotation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoFileUploaded | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Detection(_) | ApiError::Annotation(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned in the response body.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::NoFileUploaded => "No file uploaded".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Detection(_) => "Error running deepfake detection".to_string(),
            ApiError::Annotation(_) => "Error processing video with FaceMesh".to_string(),
            ApiError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

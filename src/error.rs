use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::validate::ValidationError;

/// Request-level outcomes the HTTP layer maps onto status codes.
/// `InvalidInput` and `NotFound` are expected and surfaced verbatim;
/// storage failures are logged where they happen and answered opaquely.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{}", .0.message)]
    InvalidInput(ValidationError),

    #[error("Bookmark not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::InvalidInput(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidInput(err) => (StatusCode::BAD_REQUEST, err.message.clone()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Bookmark not found".to_string()),
            ApiError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({ "error": { "message": message } }));
        (status, body).into_response()
    }
}

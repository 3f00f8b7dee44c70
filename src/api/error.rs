//! Error type for REST handlers

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::flashcards::FlashcardStorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] FlashcardStorageError),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    ///
    /// - Missing deck/card: 404
    /// - Duplicate deck name: 409
    /// - Validation failures and malformed bodies: 400
    /// - Database and lock failures: 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Storage(FlashcardStorageError::DeckNotFound(_))
            | Self::Storage(FlashcardStorageError::CardNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Storage(FlashcardStorageError::DuplicateDeck(_)) => StatusCode::CONFLICT,
            Self::Storage(FlashcardStorageError::Invalid(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("API request failed: {}", self);
        } else {
            log::debug!("API request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"detail": "..."}` with the status
//! matching its class.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gridcat_routes::RegistrationError;
use gridcat_store::{CatalogError, ExecutionError};
use thiserror::Error;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Database(_) | ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        if err.is_database() {
            ApiError::Database(err.to_string())
        } else {
            ApiError::Unexpected(err.to_string())
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(msg) => ApiError::Unprocessable(msg),
            CatalogError::Execution(e) => e.into(),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

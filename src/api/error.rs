//! HTTP error mapping.
//!
//! Domain errors become status codes here. Server-side failures are logged in
//! full and reported to the client with a generic message only.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error returned by HTTP handlers
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(value: Error) -> Self {
        Self(value)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(value: sea_orm::DbErr) -> Self {
        Self(Error::Database(value))
    }
}

impl ApiError {
    /// Status code the error maps to
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::TransactionNotFound { .. } | Error::RuleNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidAmount { .. }
            | Error::InvalidFrequency { .. }
            | Error::InvalidKind { .. }
            | Error::InvalidDate { .. }
            | Error::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self.0);
            "Something went wrong. Please try again later.".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

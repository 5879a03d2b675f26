// src/api/error.rs

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::Error;
use wavespace_common::error::ErrorCategory;

/// Wire form of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Wraps the crate error so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::BusinessRule => match err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        },
        ErrorCategory::Conflict => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Infrastructure if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        match self.0.category() {
            ErrorCategory::Infrastructure => error!("request failed: {}", self.0),
            ErrorCategory::Conflict => warn!("request failed: {}", self.0),
            _ => {}
        }
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use super::flash::{self, Flash};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::BadParams(_) => StatusCode::BAD_REQUEST,
            AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Server faults are logged in full and reported generically.
        let message = if self.is_user_facing() {
            self.to_string()
        } else {
            tracing::error!(code = self.code(), error = %self, "request failed");
            "Error interno del servidor".to_string()
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// Outcome of a form submission that failed: user-facing errors go back to
/// `back` as a flash message, server faults become a 500.
pub fn flash_failure(e: AppError, back: &str) -> Response {
    if e.is_user_facing() {
        tracing::debug!(code = e.code(), message = %e, "form rejected");
        flash::redirect_with(back, Flash::error(e.to_string()))
    } else {
        e.into_response()
    }
}

//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`tcd_core::Error`] via a wrapper so route
//! handlers can return `Result<T, AppError>` and use `?` on core results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError(tcd_core::Error);

impl From<tcd_core::Error> for AppError {
    fn from(e: tcd_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in API handler");
        }

        let code = match &self.0 {
            tcd_core::Error::NotFound { .. } => "not_found",
            tcd_core::Error::Validation(_) => "validation_error",
            tcd_core::Error::PathDenied(_) => "path_denied",
            tcd_core::Error::Conflict(_) => "conflict",
            tcd_core::Error::Database { .. } => "database_error",
            tcd_core::Error::Io { .. } => "io_error",
            tcd_core::Error::Tool { .. } => "tool_error",
            tcd_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.0.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::from(tcd_core::Error::not_found("job", 3));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn path_denied_produces_403() {
        let err = AppError::from(tcd_core::Error::PathDenied("/etc".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn validation_produces_400() {
        let err = AppError::from(tcd_core::Error::Validation("bad".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

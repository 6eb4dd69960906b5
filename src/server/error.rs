//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`vidserve_common::Error`] so that metadata
//! handlers can return `Result<T, AppError>` and use `?` on catalog calls.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vidserve_common::Error;
use vidserve_db::queries::videos::QueryError;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Message safe to show a client. Server-side detail stays in the logs.
    fn client_message(&self) -> String {
        match &self.inner {
            Error::NotFound(msg) | Error::InvalidInput(msg) => msg.clone(),
            Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
                "Internal server error.".to_string()
            }
        }
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        Self::new(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let code = match &self.inner {
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::Database(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.client_message(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

//! Structured errors for the HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors a route handler can return.
///
/// Wraps the core error so it can carry an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] bracketeer_core::Error),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Core(bracketeer_core::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ServerError::Core(bracketeer_core::Error::CacheMiss(_)) => StatusCode::NOT_FOUND,
            ServerError::Core(bracketeer_core::Error::MissingCredentials(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Core(bracketeer_core::Error::Upstream(_)) => StatusCode::BAD_GATEWAY,
            ServerError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

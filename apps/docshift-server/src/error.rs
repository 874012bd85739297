//! Error types for the docshift gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docshift_core::{ErrorKind, RenderError};
use serde::Serialize;
use thiserror::Error;

use crate::fetch::FetchError;

/// Gateway error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to prepare workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::Render(e) => {
                let code = match e.kind() {
                    ErrorKind::Configuration => "CONFIGURATION_ERROR",
                    ErrorKind::Input => "INPUT_ERROR",
                    ErrorKind::Engine => "ENGINE_ERROR",
                    ErrorKind::Io => "IO_ERROR",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, code)
            }
            ServerError::Fetch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "FETCH_FAILED"),
            ServerError::Workspace(_) | ServerError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }

        let (exit_code, stderr) = match &self {
            ServerError::Render(e) => (e.exit_code(), e.stderr().map(str::to_string)),
            _ => (None, None),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code,
            exit_code,
            stderr,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_is_400() {
        let response = ServerError::InvalidRequest("missing html".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn render_errors_map_by_kind() {
        let cases = [
            (
                RenderError::ExecutableNotFound("/x".into()),
                "CONFIGURATION_ERROR",
            ),
            (RenderError::Timeout(5), "ENGINE_ERROR"),
            (RenderError::OutputMissing("/x".into()), "IO_ERROR"),
        ];
        for (err, expected) in cases {
            let (status, code) = ServerError::Render(err).status_and_code();
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(code, expected);
        }
    }
}

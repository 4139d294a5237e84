use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("Malformed page: {0}")]
    MalformedPage(String),

    #[error("Content source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
}

impl ContentError {
    /// Short machine-readable name used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentError::MalformedPage(_) => "malformed_page",
            ContentError::SourceUnavailable(_) => "source_unavailable",
            ContentError::NotFound(_) => "not_found",
            ContentError::InvalidCursor(_) => "invalid_cursor",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ContentError::NotFound(_) => StatusCode::NOT_FOUND,
            ContentError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
            ContentError::MalformedPage(_) => StatusCode::BAD_GATEWAY,
            ContentError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ContentError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<reqwest::Error> for ContentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ContentError::MalformedPage(err.to_string())
        } else {
            ContentError::SourceUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        ContentError::MalformedPage(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ContentError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ContentError::SourceUnavailable("content source did not respond in time".to_string())
    }
}

impl From<std::io::Error> for ContentError {
    fn from(err: std::io::Error) -> Self {
        ContentError::SourceUnavailable(err.to_string())
    }
}

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Public error type of the studio pipeline.
///
/// Callers must treat [`StudioError::InvalidCredential`] differently from every
/// other variant: it means the user has to re-select their API key, while the
/// rest are "try again later" conditions.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("the API key was rejected, please re-select your API key ({0})")]
    InvalidCredential(String),
    #[error("provider unavailable after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("generation failed: {0}")]
    Fatal(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl StudioError {
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, StudioError::InvalidCredential(_))
    }

    /// Stable machine-readable code surfaced to the UI.
    pub fn code(&self) -> &'static str {
        match self {
            StudioError::InvalidCredential(_) => "reselect_credential",
            StudioError::RetriesExhausted { .. } => "provider_unavailable",
            StudioError::Fatal(_) => "generation_failed",
            StudioError::Cancelled => "cancelled",
            StudioError::InvalidInput(_) => "invalid_input",
            StudioError::NotFound(_) => "not_found",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            StudioError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            StudioError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StudioError::Fatal(_) => StatusCode::BAD_GATEWAY,
            StudioError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            StudioError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            StudioError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.code(), "message": self.to_string() }));
        (status, body).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::email::parser::FormatError;
use crate::extraction::ExtractionError;
use crate::llm_client::LlmError;

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields";
pub const EXTRACTION_FAILED_MESSAGE: &str =
    "Failed to extract text from PDF. Please ensure it is a valid PDF file.";
pub const EMPTY_TEXT_MESSAGE: &str =
    "No text found in the PDF. Please ensure your resume contains extractable text.";
pub const API_CONFIGURATION_MESSAGE: &str =
    "API configuration error. Please check your Groq API key.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Invalid form data: {0}")]
    InvalidForm(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Completion(#[from] LlmError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields | AppError::InvalidForm(_) | AppError::Extraction(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Completion(_) | AppError::Format(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message shown to the user. Never contains the raw model response.
    pub fn user_message(&self) -> String {
        match self {
            AppError::MissingFields => MISSING_FIELDS_MESSAGE.to_string(),
            AppError::InvalidForm(msg) => format!("Invalid form data: {msg}"),
            AppError::Extraction(ExtractionError::EmptyText) => EMPTY_TEXT_MESSAGE.to_string(),
            AppError::Extraction(_) => EXTRACTION_FAILED_MESSAGE.to_string(),
            AppError::Completion(e) if e.is_credential_error() => {
                API_CONFIGURATION_MESSAGE.to_string()
            }
            AppError::Completion(e) => e.to_string(),
            AppError::Format(e) => e.to_string(),
            AppError::Internal(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::MissingFields | AppError::InvalidForm(_) => {
                tracing::warn!("Rejected request: {self}");
            }
            AppError::Extraction(e) => tracing::warn!("PDF text extraction failed: {e}"),
            AppError::Completion(e) => tracing::error!("Completion error: {e}"),
            AppError::Format(e) => tracing::error!("Model response error: {e}"),
            AppError::Internal(e) => tracing::error!("Internal error: {e:?}"),
        }

        let body = Json(json!({ "error": self.user_message() }));
        (self.status(), body).into_response()
    }
}

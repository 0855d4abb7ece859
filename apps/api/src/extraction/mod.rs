//! Document text extraction — turns an uploaded PDF into one line of plain text.
//!
//! pdf-extract is synchronous and CPU-bound, so parsing runs on the blocking
//! pool. The caller only ever sees the complete text or an error.

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

/// Content types accepted for the résumé upload. Browsers occasionally send
/// `application/octet-stream` for PDFs, so that is let through to the parser.
const ACCEPTED_CONTENT_TYPES: &[&str] = &["application/pdf", "application/octet-stream"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("malformed PDF: {0}")]
    Malformed(String),

    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("PDF contains no extractable text")]
    EmptyText,
}

/// Rejects uploads that declare a non-PDF content type.
pub fn check_content_type(content_type: Option<&str>) -> Result<(), ExtractionError> {
    let Some(declared) = content_type else {
        return Ok(());
    };
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if ACCEPTED_CONTENT_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(ExtractionError::UnsupportedType(declared.to_string()))
    }
}

/// Extracts the text of every page in document order.
///
/// Fragments are joined with single spaces and the result is trimmed. A
/// well-formed document with no text yields `ExtractionError::EmptyText`.
pub async fn extract_text(document: Bytes) -> Result<String, ExtractionError> {
    let byte_len = document.len();
    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&document))
        .await
        .map_err(|e| {
            // A panic inside the parser lands here.
            warn!("PDF parser task failed: {e}");
            ExtractionError::Malformed(e.to_string())
        })?
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

    let text = normalize_whitespace(&raw);
    debug!(
        "Extracted {} chars of text from {} byte document",
        text.len(),
        byte_len
    );

    if text.is_empty() {
        return Err(ExtractionError::EmptyText);
    }
    Ok(text)
}

/// Collapses every whitespace run (including page breaks) into a single space.
fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

//! Response parser — turns the model's raw completion into a `GeneratedEmail`.
//!
//! Order: strict JSON (after stripping code fences), then a pattern-based
//! fallback for almost-JSON output, then validation of both fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::email::GeneratedEmail;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Failed to parse model response")]
    Unparseable,

    #[error("Invalid response format from model")]
    InvalidFormat,
}

// A JSON string body: anything but a bare quote or backslash, or an escape pair.
// Escaped quotes are captured instead of ending the value early.
static RE_SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""subject"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static RE_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""content"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());

/// Parses and validates a raw completion.
pub fn parse_email_response(raw: &str) -> Result<GeneratedEmail, FormatError> {
    let (subject, content) = match parse_strict(raw) {
        Some(fields) => fields,
        None => {
            warn!("Model response is not valid JSON, trying fallback extraction");
            debug!("Raw model response: {raw}");
            parse_fallback(raw).ok_or(FormatError::Unparseable)?
        }
    };

    match (subject, content) {
        (Some(subject), Some(content))
            if !subject.trim().is_empty() && !content.trim().is_empty() =>
        {
            Ok(GeneratedEmail { subject, content })
        }
        _ => Err(FormatError::InvalidFormat),
    }
}

type Fields = (Option<String>, Option<String>);

/// Any syntactically valid JSON counts as a strict parse; missing or
/// non-string fields are left for validation to reject.
fn parse_strict(raw: &str) -> Option<Fields> {
    let value: Value = serde_json::from_str(strip_json_fences(raw)).ok()?;
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    Some((field("subject"), field("content")))
}

fn parse_fallback(raw: &str) -> Option<Fields> {
    let subject = RE_SUBJECT.captures(raw)?;
    let content = RE_CONTENT.captures(raw)?;
    Some((
        Some(unescape_json_string(&subject[1])),
        Some(unescape_json_string(&content[1])),
    ))
}

/// Decodes JSON string escapes. Raw line breaks and tabs, which models emit
/// inside otherwise-JSON strings, are escaped first. Anything still invalid
/// falls back to unescaping `\n` only.
fn unescape_json_string(body: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{body}\""))
        .or_else(|_| {
            let escaped = escape_raw_controls(body);
            serde_json::from_str::<String>(&format!("\"{escaped}\""))
        })
        .unwrap_or_else(|_| body.replace("\\n", "\n"))
}

fn escape_raw_controls(body: &str) -> String {
    body.replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

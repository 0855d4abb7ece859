//! Cold-email generation pipeline.
//!
//! Flow: check upload type → extract résumé text → build prompt →
//!       one completion call → parse and validate → return.
//!
//! Strictly sequential per request. The completion call is the only await that
//! leaves the process; nothing is cached or retained between requests.

use tracing::info;

use crate::email::parser::parse_email_response;
use crate::email::prompts::build_prompt;
use crate::errors::AppError;
use crate::extraction::{check_content_type, extract_text};
use crate::llm_client::CompletionProvider;
use crate::models::email::{GeneratedEmail, UploadRequest};

/// Runs the full pipeline for one validated request.
pub async fn generate_email(
    completer: &dyn CompletionProvider,
    request: UploadRequest,
) -> Result<GeneratedEmail, AppError> {
    let UploadRequest {
        resume,
        company_name,
        job_title,
        required_skills,
    } = request;

    // Step 1: Extract résumé text
    check_content_type(resume.content_type.as_deref())?;
    let resume_text = extract_text(resume.data).await?;
    info!("Extracted {} chars of résumé text", resume_text.len());

    // Step 2: Build prompt
    let prompt = build_prompt(
        &resume_text,
        &company_name,
        &job_title,
        required_skills.as_deref(),
    );

    // Step 3: Completion + parse
    request_email(completer, &prompt).await
}

/// Sends one prompt and parses the reply into a validated email.
pub async fn request_email(
    completer: &dyn CompletionProvider,
    prompt: &str,
) -> Result<GeneratedEmail, AppError> {
    info!("Requesting completion ({} char prompt)", prompt.len());
    let raw = completer.complete(prompt).await?;
    let email = parse_email_response(&raw)?;
    info!(
        "Generated email: subject {} chars, body {} chars",
        email.subject.len(),
        email.content.len()
    );
    Ok(email)
}

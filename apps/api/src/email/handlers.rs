//! Axum route handler for the cold-email endpoint.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use tracing::{info, instrument};

use crate::email::generator::generate_email;
use crate::errors::AppError;
use crate::models::email::{GeneratedEmail, ResumeUpload, UploadRequest};
use crate::state::AppState;

/// POST /api/generate-email
///
/// Multipart fields: `resume` (PDF), `companyName`, `jobTitle`, optional `requiredSkills`.
/// Returns `{ subject, content }`, or `{ error }` with 400/500.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn handle_generate_email(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GeneratedEmail>, AppError> {
    let multipart = multipart.map_err(|rej| AppError::InvalidForm(rej.body_text()))?;
    let request = read_upload_request(multipart).await?;
    info!(
        "Generating email for {} at {} ({} byte résumé {:?}, skills: {})",
        request.job_title,
        request.company_name,
        request.resume.data.len(),
        request.resume.file_name,
        request.required_skills.is_some()
    );

    let email = generate_email(state.completer.as_ref(), request).await?;
    Ok(Json(email))
}

/// Drains the multipart stream into a validated `UploadRequest`.
/// Unknown fields are ignored; the last occurrence of a repeated field wins.
async fn read_upload_request(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut resume: Option<ResumeUpload> = None;
    let mut company_name: Option<String> = None;
    let mut job_title: Option<String> = None;
    let mut required_skills: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidForm(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidForm(e.body_text()))?;
                resume = Some(ResumeUpload {
                    file_name,
                    content_type,
                    data,
                });
            }
            "companyName" => company_name = Some(read_text(field).await?),
            "jobTitle" => job_title = Some(read_text(field).await?),
            "requiredSkills" => required_skills = Some(read_text(field).await?),
            _ => {}
        }
    }

    let resume = resume
        .filter(|r| !r.data.is_empty())
        .ok_or(AppError::MissingFields)?;
    let company_name = non_blank(company_name).ok_or(AppError::MissingFields)?;
    let job_title = non_blank(job_title).ok_or(AppError::MissingFields)?;

    Ok(UploadRequest {
        resume,
        company_name,
        job_title,
        required_skills: non_blank(required_skills),
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidForm(e.body_text()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

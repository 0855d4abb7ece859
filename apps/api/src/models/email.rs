use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Uploaded résumé as received from the multipart form.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A validated generate-email request. Lives only for the duration of one handler call.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub resume: ResumeUpload,
    pub company_name: String,
    pub job_title: String,
    /// `None` when the form omitted the field or sent only whitespace.
    pub required_skills: Option<String>,
}

/// The cold email returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub content: String,
}

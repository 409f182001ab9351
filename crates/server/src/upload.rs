//! Multipart form staging for the webhook endpoints.
//!
//! The `video` part is streamed to the upload directory under a unique name
//! and held in a `TempPath`, so it disappears when the request is done with
//! it. Text parts are collected as plain fields.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use vidhook_core::error::ApiError;
use vidhook_core::filename::{is_allowed_upload, secure_filename, unique_upload_name};

use crate::error::{AppError, payload_too_large};
use crate::state::AppState;

pub const VIDEO_FIELD: &str = "video";

/// An upload saved to disk for one job.
pub struct StagedUpload {
    pub job_id: String,
    /// Sanitized client filename.
    pub original_file: String,
    pub path: TempPath,
}

pub enum UploadedVideo {
    Staged(StagedUpload),
    /// Present but empty-named or with an unsupported extension; never written.
    Unaccepted { file_name: String },
}

pub struct UploadForm {
    pub video: Option<UploadedVideo>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Drain a multipart body. The first part of each name wins.
pub async fn read_upload_form(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<UploadForm, AppError> {
    let mut video = None;
    let mut fields = HashMap::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, state.max_upload_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == VIDEO_FIELD {
            // A text part named `video` is not a file upload.
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            if video.is_some() {
                continue;
            }
            if file_name.is_empty() || !is_allowed_upload(&file_name) {
                debug!(file_name = %file_name, "video part not accepted");
                video = Some(UploadedVideo::Unaccepted { file_name });
                continue;
            }

            let job_id = uuid::Uuid::new_v4().to_string();
            let original_file = secure_filename(&file_name);
            let path = TempPath::try_from_path(
                state
                    .processor
                    .upload_path(&unique_upload_name(&job_id, &original_file)),
            )
            .map_err(|e| ApiError::Internal(format!("Internal server error: {e}")))?;

            let mut file = tokio::fs::File::create(&path)
                .await
                .map_err(|e| ApiError::Internal(format!("Internal server error: {e}")))?;
            let mut written: u64 = 0;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, state.max_upload_bytes))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| ApiError::Internal(format!("Internal server error: {e}")))?;
                written += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(|e| ApiError::Internal(format!("Internal server error: {e}")))?;

            info!(job_id = %job_id, file = %original_file, bytes = written, "upload staged");
            video = Some(UploadedVideo::Staged(StagedUpload {
                job_id,
                original_file,
                path,
            }));
        } else if field.file_name().is_none() && !fields.contains_key(&name) {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, state.max_upload_bytes))?;
            fields.insert(name, value);
        }
    }

    Ok(UploadForm { video, fields })
}

fn multipart_error(e: MultipartError, limit_bytes: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        payload_too_large(limit_bytes).into()
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", e.body_text())).into()
    }
}

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use vidhook_core::error::ApiError;
use vidhook_core::time::utc_timestamp;
use vidhook_core::types::ProcessingParams;
use vidhook_core::units::bytes_to_mb;
use vidhook_transcoder::ffprobe::VideoMetadata;
use vidhook_transcoder::processor::FileSizeReduction;
use vidhook_transcoder::script::ScriptOutcome;

use crate::error::{AppError, payload_too_large};
use crate::state::AppState;
use crate::upload::{StagedUpload, UploadedVideo, read_upload_form};

pub const SERVICE_NAME: &str = "video-processing-webhook";

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/webhook/video/process", post(process_video))
        .route("/webhook/video/metadata", post(extract_metadata))
        .route("/webhook/execute-script", post(execute_script))
        .route("/download/{filename}", get(crate::download::download_file))
        .fallback(endpoint_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .with_state(state)
}

fn download_url(file_name: &str) -> String {
    format!("/download/{file_name}")
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp: String,
    ffmpeg_available: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: utc_timestamp(),
        ffmpeg_available: state.processor.ffmpeg_available().await,
    })
}

// ---------------------------------------------------------------------------
// Video processing
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ProcessResponse {
    success: bool,
    job_id: String,
    original_file: String,
    processed_file: String,
    metadata: VideoMetadata,
    processing_time: f64,
    file_size_reduction: Option<FileSizeReduction>,
    download_url: String,
    timestamp: String,
}

fn require_multipart(headers: &HeaderMap) -> Result<(), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Content-Type header missing".into()))?;

    if !content_type.starts_with("multipart/form-data") {
        return Err(ApiError::BadRequest(
            "Content-Type must be multipart/form-data for file uploads".into(),
        ));
    }
    Ok(())
}

async fn process_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, AppError> {
    require_multipart(&headers).inspect_err(|e| error!(error = %e, "request validation failed"))?;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut form = read_upload_form(&state, &mut multipart).await?;

    let Some(video) = form.video.take() else {
        return Err(ApiError::BadRequest("No video file in request".into()).into());
    };

    let params = ProcessingParams::from_fields(
        form.field("output_format"),
        form.field("quality"),
        form.field("resolution"),
        form.field("compress"),
    )
    .inspect_err(|e| error!(error = %e, "request validation failed"))?;

    let upload: StagedUpload = match video {
        UploadedVideo::Unaccepted { file_name } if file_name.is_empty() => {
            return Err(ApiError::BadRequest("No file selected".into()).into());
        }
        UploadedVideo::Unaccepted { .. } => {
            return Err(ApiError::BadRequest(
                "Invalid file format. Supported formats: MP4, AVI, MOV, WebM".into(),
            )
            .into());
        }
        UploadedVideo::Staged(upload) => upload,
    };

    let StagedUpload {
        job_id,
        original_file,
        path,
    } = upload;

    info!(job_id = %job_id, file = %original_file, ?params, "processing video");

    match state.processor.process_video(path, &params).await {
        Ok(result) => {
            info!(job_id = %job_id, output = %result.output_file, "video processing completed");
            Ok(Json(ProcessResponse {
                success: true,
                job_id,
                original_file,
                download_url: download_url(&result.output_file),
                processed_file: result.output_file,
                metadata: result.metadata,
                processing_time: result.processing_time,
                file_size_reduction: result.file_size_reduction,
                timestamp: utc_timestamp(),
            }))
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "video processing failed");
            Err(AppError::from(ApiError::Internal(e.client_message())).with_detail("job_id", job_id))
        }
    }
}

#[derive(Serialize)]
struct MetadataResponse {
    success: bool,
    metadata: VideoMetadata,
    original_file: String,
    timestamp: String,
}

async fn extract_metadata(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MetadataResponse>, AppError> {
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::BadRequest("No video file provided".into()).into());
    };

    let form = read_upload_form(&state, &mut multipart).await?;

    let upload = match form.video {
        None => return Err(ApiError::BadRequest("No video file provided".into()).into()),
        Some(UploadedVideo::Unaccepted { .. }) => {
            return Err(ApiError::BadRequest("Invalid or missing video file".into()).into());
        }
        Some(UploadedVideo::Staged(upload)) => upload,
    };

    let extracted = state.processor.extract_metadata(&upload.path).await;
    drop(upload.path);

    match extracted {
        Ok(metadata) => Ok(Json(MetadataResponse {
            success: true,
            metadata,
            original_file: upload.original_file,
            timestamp: utc_timestamp(),
        })),
        Err(e) => {
            error!(job_id = %upload.job_id, error = %e, "error extracting metadata");
            Err(ApiError::Internal("Failed to extract video metadata".into()).into())
        }
    }
}

// ---------------------------------------------------------------------------
// Script execution
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ScriptResponse {
    success: bool,
    job_id: String,
    output: String,
    video_path: String,
    download_url: String,
    file_size_mb: f64,
    timestamp: String,
}

async fn execute_script(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ScriptResponse>, AppError> {
    let Some(runner) = state.scripts.clone() else {
        return Err(ApiError::NotFound("Endpoint not found".into()).into());
    };

    let Json(body) = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            payload_too_large(state.max_upload_bytes)
        } else {
            ApiError::BadRequest("Request must contain JSON data".into())
        }
    })?;

    let script = match body.get("script") {
        None => return Err(ApiError::BadRequest("No script provided".into()).into()),
        Some(serde_json::Value::String(s)) => s.as_str(),
        Some(_) => return Err(ApiError::BadRequest("Script must be a string".into()).into()),
    };

    let outcome = runner
        .run(script)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match outcome {
        ScriptOutcome::Completed(artifact) => Ok(Json(ScriptResponse {
            success: true,
            download_url: download_url(&artifact.processed_file),
            file_size_mb: bytes_to_mb(artifact.size_bytes),
            job_id: artifact.job_id,
            output: artifact.stdout,
            video_path: artifact.video_path.display().to_string(),
            timestamp: utc_timestamp(),
        })),
        ScriptOutcome::Failed {
            code,
            stdout,
            stderr,
        } => Err(
            AppError::from(ApiError::Internal(format!("Script failed with code {code}")))
                .with_detail("output", stdout)
                .with_detail("error_output", stderr),
        ),
        ScriptOutcome::NoOutput { stdout, stderr } => Err(AppError::from(ApiError::Internal(
            "Script completed but no video file was created".into(),
        ))
        .with_detail("output", stdout)
        .with_detail("stderr", stderr)),
        ScriptOutcome::TimedOut { after } => Err(ApiError::Internal(format!(
            "Script execution timed out ({} seconds)",
            after.as_secs()
        ))
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Fallbacks
// ---------------------------------------------------------------------------

async fn endpoint_not_found() -> AppError {
    ApiError::NotFound("Endpoint not found".into()).into()
}

async fn method_not_allowed() -> AppError {
    ApiError::MethodNotAllowed("Method not allowed".into()).into()
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "handler panicked");
    AppError::from(ApiError::Internal("Internal server error".into())).into_response()
}

//! Axum route handlers for the Interview API.

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::errors::AppError;
use crate::interview::media::media_from_upload;
use crate::interview::models::Session;
use crate::interview::pipeline::{
    AnswerResponse, AnswerSubmission, FinalReportResponse, IntroResponse,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FinalReportRequest {
    pub session_id: String,
}

/// Fields collected from a multipart upload.
#[derive(Default)]
struct UploadForm {
    video: Option<UploadedFile>,
    session_id: Option<String>,
    question_id: Option<String>,
    question_text: Option<String>,
}

struct UploadedFile {
    bytes: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /analyze_intro
///
/// Multipart: `video` (required), `session_id` (optional, retries a failed intro).
pub async fn handle_analyze_intro(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IntroResponse>, AppError> {
    let form = read_form(multipart).await?;
    let video = required(form.video, "video")?;
    let media = media_from_upload(
        video.bytes,
        video.content_type.as_deref(),
        video.file_name.as_deref(),
        state.config.max_media_bytes,
    )?;
    let session_id = form.session_id.filter(|id| !id.trim().is_empty());

    let response = state.pipeline.submit_intro(session_id, media).await?;
    Ok(Json(response))
}

/// POST /analyze_answer
///
/// Multipart: `video`, `session_id`, `question_id`, `question_text` (all required).
pub async fn handle_analyze_answer(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnswerResponse>, AppError> {
    let form = read_form(multipart).await?;

    let session_id = required_text(form.session_id, "session_id")?;
    let question_id = required_text(form.question_id, "question_id")?
        .parse::<u32>()
        .map_err(|_| AppError::Validation("question_id must be a positive integer".to_string()))?;
    let question_text = required_text(form.question_text, "question_text")?;
    let video = required(form.video, "video")?;
    let media = media_from_upload(
        video.bytes,
        video.content_type.as_deref(),
        video.file_name.as_deref(),
        state.config.max_media_bytes,
    )?;

    let response = state
        .pipeline
        .submit_answer(AnswerSubmission {
            session_id,
            question_id,
            question_text,
            media,
        })
        .await?;
    Ok(Json(response))
}

/// POST /final_report
///
/// Completes the session and returns aggregated scores. Safe to repeat.
pub async fn handle_final_report(
    State(state): State<AppState>,
    payload: Result<Json<FinalReportRequest>, JsonRejection>,
) -> Result<Json<FinalReportResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let session_id = required_text(Some(request.session_id), "session_id")?;
    let response = state.pipeline.final_report(&session_id).await?;
    Ok(Json(response))
}

/// GET /sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.pipeline.session(&session_id).await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Multipart helpers
// ────────────────────────────────────────────────────────────────────────────

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.video = Some(UploadedFile {
                    bytes,
                    content_type,
                    file_name,
                });
            }
            "session_id" => form.session_id = Some(field.text().await.map_err(multipart_error)?),
            "question_id" => form.question_id = Some(field.text().await.map_err(multipart_error)?),
            "question_text" => {
                form.question_text = Some(field.text().await.map_err(multipart_error)?)
            }
            other => tracing::debug!("Ignoring unexpected multipart field '{other}'"),
        }
    }

    Ok(form)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::MalformedMedia(format!("upload too large: {}", e.body_text()))
    } else {
        AppError::Validation(format!("invalid multipart body: {}", e.body_text()))
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("missing required field '{field}'")))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    let text = required(value, field)?.trim().to_string();
    if text.is_empty() {
        return Err(AppError::Validation(format!("'{field}' cannot be empty")));
    }
    Ok(text)
}

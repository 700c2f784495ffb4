//! Media intake: validates uploaded clips before they reach the gateway,
//! and optionally archives intro clips to disk.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::gateway::Media;

const DEFAULT_MIME: &str = "video/webm";

/// Builds a `Media` from an uploaded part.
///
/// The declared content type wins when it is a video or audio type;
/// `application/octet-stream` or a missing type falls back to the file
/// extension, defaulting to WebM (what browsers record).
pub fn media_from_upload(
    bytes: Bytes,
    content_type: Option<&str>,
    file_name: Option<&str>,
    max_bytes: usize,
) -> Result<Media, AppError> {
    if bytes.is_empty() {
        return Err(AppError::MalformedMedia("uploaded video is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::MalformedMedia(format!(
            "uploaded video is {} bytes, limit is {max_bytes}",
            bytes.len()
        )));
    }

    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    let mime_type = match declared {
        Some(ct) if ct.starts_with("video/") || ct.starts_with("audio/") => ct,
        Some(ct) => {
            return Err(AppError::MalformedMedia(format!(
                "unsupported content type '{ct}', expected video or audio"
            )))
        }
        None => mime_from_extension(file_name).to_string(),
    };

    Ok(Media { bytes, mime_type })
}

fn mime_from_extension(file_name: Option<&str>) -> &'static str {
    let ext = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => DEFAULT_MIME,
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" | "video/ogg" => "ogg",
        _ => "webm",
    }
}

/// Writes the intro clip to `<dir>/<session_id>/intro.<ext>`.
/// Best-effort: failures are logged and never fail the request.
pub async fn archive_intro(dir: &Path, session_id: &str, media: &Media) -> Option<PathBuf> {
    let session_dir = dir.join(session_id);
    let path = session_dir.join(format!("intro.{}", extension_for(&media.mime_type)));

    if let Err(e) = tokio::fs::create_dir_all(&session_dir).await {
        warn!("Failed to create upload directory {}: {e}", session_dir.display());
        return None;
    }
    match tokio::fs::write(&path, &media.bytes).await {
        Ok(()) => {
            info!("Saved intro upload to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Failed to persist intro upload to {}: {e}", path.display());
            None
        }
    }
}
